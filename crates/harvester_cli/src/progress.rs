use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_engine::{HarvestEvent, ProgressSink};

/// Reports harvest progress through the logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::PageFetched {
                collection,
                page,
                items,
                has_more,
            } => engine_debug!("[{}] page {}: {} items (more: {})", collection, page, items, has_more),
            HarvestEvent::Backoff {
                collection,
                page,
                attempt,
                delay,
            } => engine_warn!(
                "[{}] page {} throttled, attempt {}; waiting {:?}",
                collection,
                page,
                attempt,
                delay
            ),
            HarvestEvent::RecordsAdded { collection, total } => {
                engine_info!("[{}] {} records so far", collection, total)
            }
            HarvestEvent::PageFailed {
                collection,
                page,
                kind,
            } => engine_warn!("[{}] page {} failed: {}", collection, page, kind),
            HarvestEvent::Drained {
                collection,
                records,
                errors,
            } => engine_info!("[{}] drained: {} records, {} errors", collection, records, errors),
        }
    }
}
