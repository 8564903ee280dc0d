use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use harvester_core::{
    update, CollectionResult, Effect, ErrorKind, HarvestState, Msg, PageId, PagePlan,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::gate::RateGate;
use crate::normalize::{ItemNormalizer, OwnerContext};
use crate::page::PageFetcher;
use crate::{
    CollectionKind, FailureKind, FetchError, HarvestEvent, HarvestSettings, HarvestTarget,
    NullSink, ProgressSink, RawPage,
};

/// Backoff and concurrency knobs of one harvester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestOptions {
    pub rate_limit_backoff: Duration,
    /// `None` keeps retrying a throttled page until it succeeds or is cancelled.
    pub max_rate_limit_retries: Option<u32>,
    pub item_concurrency: usize,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        HarvestOptions::from(&HarvestSettings::default())
    }
}

impl From<&HarvestSettings> for HarvestOptions {
    fn from(settings: &HarvestSettings) -> Self {
        Self {
            rate_limit_backoff: settings.rate_limit_backoff,
            max_rate_limit_retries: settings.max_rate_limit_retries,
            item_concurrency: settings.item_concurrency,
        }
    }
}

/// Walks one paginated collection: fetch a page, spawn its continuation,
/// normalize its items, and join every page task before returning.
pub struct Harvester {
    collection: CollectionKind,
    fetcher: Arc<dyn PageFetcher>,
    normalizer: Arc<dyn ItemNormalizer>,
    gate: RateGate,
    options: HarvestOptions,
    sink: Arc<dyn ProgressSink>,
}

impl Harvester {
    pub fn new(
        collection: CollectionKind,
        fetcher: Arc<dyn PageFetcher>,
        normalizer: Arc<dyn ItemNormalizer>,
        gate: RateGate,
    ) -> Self {
        Self {
            collection,
            fetcher,
            normalizer,
            gate,
            options: HarvestOptions::default(),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_options(mut self, options: HarvestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn collection(&self) -> CollectionKind {
        self.collection
    }

    /// Run the harvest to completion. Page and item failures end up in the
    /// result's error log; nothing is returned as `Err`.
    pub async fn run(
        &self,
        target: &HarvestTarget,
        owner: &OwnerContext,
        cancel: &CancellationToken,
    ) -> CollectionResult {
        let started = Instant::now();
        let plan = PagePlan::compute(target.total_wanted, target.page_size);
        engine_info!(
            "harvest {} for {}: {} wanted, {} requests of {}",
            self.collection,
            owner.label(),
            target.total_wanted,
            plan.request_count,
            plan.page_size
        );

        let run = Arc::new(HarvestRun {
            collection: self.collection,
            resource_id: target.resource_id.clone(),
            owner: owner.clone(),
            fetcher: Arc::clone(&self.fetcher),
            normalizer: Arc::clone(&self.normalizer),
            gate: self.gate.clone(),
            options: self.options,
            sink: Arc::clone(&self.sink),
            state: Mutex::new(HarvestState::new(plan)),
            tracker: TaskTracker::new(),
            parent: cancel.clone(),
            cancel: cancel.child_token(),
        });

        run.apply(Msg::Start {
            cursor: target.start_cursor.clone(),
        });
        run.apply(Msg::DrainRequested);
        run.tracker.close();
        run.tracker.wait().await;

        let state = std::mem::take(&mut *run.lock_state());
        let result = state.into_result(started.elapsed());
        engine_info!(
            "harvest {} for {} finished: {:?}, {} records, {} errors in {:?}",
            self.collection,
            owner.label(),
            result.status,
            result.records.len(),
            result.errors.len(),
            result.elapsed
        );
        result
    }
}

struct Tally {
    records: usize,
    errors: usize,
}

/// Everything a page task needs; shared by all tasks of one harvest.
struct HarvestRun {
    collection: CollectionKind,
    resource_id: String,
    owner: OwnerContext,
    fetcher: Arc<dyn PageFetcher>,
    normalizer: Arc<dyn ItemNormalizer>,
    gate: RateGate,
    options: HarvestOptions,
    sink: Arc<dyn ProgressSink>,
    state: Mutex<HarvestState>,
    tracker: TaskTracker,
    /// Caller's token; a cancelled parent marks the harvest cancelled.
    parent: CancellationToken,
    /// This harvest's token; also fired to stop siblings of a fatal page.
    cancel: CancellationToken,
}

impl HarvestRun {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, HarvestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one message through the state machine and execute its effects.
    fn apply(self: &Arc<Self>, msg: Msg) {
        let (effects, tally) = {
            let mut guard = self.lock_state();
            let state = std::mem::take(&mut *guard);
            let (state, effects) = update(state, msg);
            let tally = Tally {
                records: state.records().len(),
                errors: state.errors().len(),
            };
            *guard = state;
            (effects, tally)
        };

        for effect in effects {
            match effect {
                Effect::FetchPage {
                    page,
                    cursor,
                    page_size,
                } => {
                    engine_debug!(
                        "{} spawn page {} (size {}, cursor {:?})",
                        self.collection,
                        page,
                        page_size,
                        cursor
                    );
                    self.tracker
                        .spawn(page_task(Arc::clone(self), page, cursor, page_size));
                }
                Effect::CancelSiblings => {
                    engine_warn!(
                        "{} harvest for {} stopped early",
                        self.collection,
                        self.owner.label()
                    );
                    self.cancel.cancel();
                }
                Effect::Drained => self.sink.emit(HarvestEvent::Drained {
                    collection: self.collection,
                    records: tally.records,
                    errors: tally.errors,
                }),
            }
        }
    }

    async fn execute_page(self: &Arc<Self>, page: PageId, cursor: String, page_size: u32) {
        let _permit = match self.gate.acquire(&self.cancel).await {
            Ok(permit) => permit,
            Err(err) => return self.fail(page, err),
        };

        let raw = match self.fetch_with_backoff(page, &cursor, page_size).await {
            Ok(raw) => raw,
            Err(err) => return self.fail(page, err),
        };

        self.sink.emit(HarvestEvent::PageFetched {
            collection: self.collection,
            page,
            items: raw.items.len(),
            has_more: raw.has_more,
        });
        let RawPage {
            items,
            next_cursor,
            has_more,
        } = raw;
        self.apply(Msg::PageFetched {
            page,
            next_cursor,
            has_more,
            item_count: items.len(),
        });

        self.normalize_page(page, &items).await;
    }

    async fn fetch_with_backoff(
        self: &Arc<Self>,
        page: PageId,
        cursor: &str,
        page_size: u32,
    ) -> Result<RawPage, FetchError> {
        let mut attempts: u32 = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(FetchError::cancelled()),
                result = self.fetcher.fetch(&self.resource_id, cursor, page_size) => result,
            };
            let err = match result {
                Err(err) if err.is_rate_limited() => err,
                other => return other,
            };

            attempts += 1;
            self.raise(
                ErrorKind::RateLimited,
                format!("RATE_LIMITED [{}] {}", self.collection, self.resource_id),
            );
            if self
                .options
                .max_rate_limit_retries
                .is_some_and(|max| attempts > max)
            {
                return Err(FetchError::new(
                    FailureKind::RetriesExhausted { attempts },
                    format!("page {page} still throttled: {}", err.message),
                ));
            }

            let delay = self.options.rate_limit_backoff;
            engine_warn!(
                "{} page {} for {} rate limited (attempt {}), sleeping {:?}",
                self.collection,
                page,
                self.owner.label(),
                attempts,
                delay
            );
            self.sink.emit(HarvestEvent::Backoff {
                collection: self.collection,
                page,
                attempt: attempts,
                delay,
            });
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchError::cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn normalize_page(self: &Arc<Self>, page: PageId, items: &[Value]) {
        let limit = self.options.item_concurrency.max(1);
        let pending: Vec<_> = items
            .iter()
            .map(|item| async move {
                let outcome = self
                    .normalizer
                    .normalize(item, &self.owner, &self.cancel)
                    .await;
                (item, outcome)
            })
            .collect();
        let mut results = stream::iter(pending).buffer_unordered(limit);

        let mut added = false;
        while let Some((item, outcome)) = results.next().await {
            match outcome {
                Ok(records) => {
                    added |= !records.is_empty();
                    self.apply(Msg::RecordsNormalized { page, records });
                }
                Err(err) if err.is_cancelled() => {
                    self.note_cancelled();
                    break;
                }
                Err(err) => {
                    let kind = err.kind.error_kind();
                    engine_warn!("{} item {} skipped: {}", self.collection, item_label(item), err);
                    self.raise(
                        kind,
                        format!(
                            "{} [{}] {}: {}",
                            kind,
                            self.collection,
                            item_label(item),
                            err.message
                        ),
                    );
                }
            }
        }

        if added {
            let total = self.lock_state().records().len();
            self.sink.emit(HarvestEvent::RecordsAdded {
                collection: self.collection,
                total,
            });
        }
    }

    fn raise(self: &Arc<Self>, kind: ErrorKind, message: String) {
        self.apply(Msg::ErrorRaised {
            kind,
            message,
            at: Utc::now(),
        });
    }

    fn fail(self: &Arc<Self>, page: PageId, err: FetchError) {
        if err.is_cancelled() {
            return self.note_cancelled();
        }
        engine_warn!("{} page {} failed: {}", self.collection, page, err);
        self.sink.emit(HarvestEvent::PageFailed {
            collection: self.collection,
            page,
            kind: err.kind.clone(),
        });
        let kind = err.kind.error_kind();
        self.apply(Msg::PageFailed {
            page,
            kind,
            message: format!("{} [{}] {}: {}", kind, self.collection, self.resource_id, err.message),
            at: Utc::now(),
        });
    }

    /// A task observed cancellation. Only the caller's token makes the
    /// harvest itself cancelled; a sibling stop keeps the status it set.
    fn note_cancelled(self: &Arc<Self>) {
        if self.parent.is_cancelled() {
            self.apply(Msg::CancelRequested { at: Utc::now() });
        }
    }
}

fn item_label(item: &Value) -> &str {
    item.get("shortcode")
        .or_else(|| item.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
}

/// Boxed so the task type stays nameable while it spawns its own continuation.
fn page_task(
    run: Arc<HarvestRun>,
    page: PageId,
    cursor: String,
    page_size: u32,
) -> BoxFuture<'static, ()> {
    async move {
        run.execute_page(page, cursor, page_size).await;
        run.apply(Msg::PageFinished { page });
    }
    .boxed()
}
