use std::sync::Arc;

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::{
    CollectionResult, ErrorEntry, ErrorKind, HarvestStatus, NotificationFeed, ProfileInfo,
    StoryBundle,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::{response_json, response_text};
use crate::detail::{DetailSource, HttpDetailSource, ScriptJsonDecoder};
use crate::gate::RateGate;
use crate::harvester::{HarvestOptions, Harvester};
use crate::normalize::{EdgeNormalizer, ItemNormalizer, MediaNormalizer, OwnerContext};
use crate::page::{classify_status, GraphPageFetcher};
use crate::query::{GraphQueryEncoder, OperationKind, QueryEncoder, QueryParams};
use crate::{
    CollectionKind, FailureKind, FetchError, HarvestRequest, HarvestSettings, NullSink,
    ProgressSink, ReqwestTransport, Transport, TransportResponse, TransportSettings,
    EXPLORE_START_CURSOR,
};

const NOT_FOUND_MARKER: &str = "The link you followed may be broken";

/// Hard failures of profile resolution; everything else lands in a result's error log.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("no valid session cookie configured")]
    NoValidSession,
    #[error("user not found: {username}")]
    NotFound { username: String },
    #[error("profile {username} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        username: String,
        attempts: u32,
        message: String,
    },
    #[error("profile lookup cancelled")]
    Cancelled,
    #[error(transparent)]
    Request(#[from] FetchError),
}

#[derive(Debug, Deserialize, Default)]
struct Count {
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
struct ProfileNode {
    id: String,
    username: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    edge_owner_to_timeline_media: Count,
    #[serde(default)]
    edge_follow: Count,
    #[serde(default)]
    edge_followed_by: Count,
    #[serde(default)]
    profile_pic_url: String,
    #[serde(default)]
    profile_pic_url_hd: String,
    #[serde(default)]
    biography: Option<String>,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    followed_by_viewer: bool,
}

impl From<ProfileNode> for ProfileInfo {
    fn from(node: ProfileNode) -> Self {
        ProfileInfo {
            id: node.id,
            username: node.username,
            full_name: node.full_name,
            media_count: node.edge_owner_to_timeline_media.count,
            follower_count: node.edge_followed_by.count,
            following_count: node.edge_follow.count,
            avatar_url: node.profile_pic_url,
            avatar_url_hd: node.profile_pic_url_hd,
            biography: node.biography.unwrap_or_default(),
            is_private: node.is_private,
            is_verified: node.is_verified,
            followed_by_viewer: node.followed_by_viewer,
        }
    }
}

/// Decode the profile-info answer. Any non-2xx other than 404 counts as throttling.
pub fn classify_profile(response: &TransportResponse) -> Result<ProfileInfo, FetchError> {
    let text = response_text(response)?;
    if response.status == 404 || text.contains(NOT_FOUND_MARKER) {
        return Err(FetchError::new(FailureKind::NotFound, "USER_NOT_FOUND"));
    }
    if !response.is_success() {
        return Err(FetchError::new(
            FailureKind::RateLimited,
            format!("RATE_LIMITED [information] status {}", response.status),
        ));
    }
    let envelope = response_json(response)?;
    let user = envelope
        .pointer("/graphql/user")
        .ok_or_else(|| FetchError::malformed("profile user block missing"))?;
    let node = ProfileNode::deserialize(user)
        .map_err(|err| FetchError::malformed(format!("profile: {err}")))?;
    Ok(node.into())
}

/// Public async surface: profile lookup and every collection harvest.
///
/// All calls share one transport, one rate gate and one cancellation token.
pub struct GraphClient {
    settings: HarvestSettings,
    transport: Arc<dyn Transport>,
    encoder: Arc<dyn QueryEncoder>,
    details: Arc<dyn DetailSource>,
    gate: RateGate,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl GraphClient {
    pub fn new(settings: HarvestSettings) -> Result<Self, FetchError> {
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::new(TransportSettings::from(&settings))?);
        let encoder: Arc<dyn QueryEncoder> = Arc::new(GraphQueryEncoder::new(
            &settings.base_url,
            settings.operation_hashes.clone(),
        )?);
        let decoder = Arc::new(ScriptJsonDecoder::new(
            settings.detail_script_indices.clone(),
        ));
        let details: Arc<dyn DetailSource> = Arc::new(HttpDetailSource::new(
            Arc::clone(&transport),
            Arc::clone(&encoder),
            decoder,
        ));
        Ok(Self::with_parts(settings, transport, encoder, details))
    }

    /// Assemble a client from explicit collaborators.
    pub fn with_parts(
        settings: HarvestSettings,
        transport: Arc<dyn Transport>,
        encoder: Arc<dyn QueryEncoder>,
        details: Arc<dyn DetailSource>,
    ) -> Self {
        let gate = RateGate::new(settings.worker_limit);
        Self {
            settings,
            transport,
            encoder,
            details,
            gate,
            sink: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Token shared by every call of this client. Cancelling it stops all
    /// running harvests; they return what they collected so far.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    async fn get(&self, url: &Url) -> Result<TransportResponse, FetchError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::cancelled()),
            response = self.transport.get(url) => response,
        }
    }

    async fn pause(&self, delay: std::time::Duration) -> Result<(), ProfileError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProfileError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    pub async fn fetch_profile(&self, username: &str) -> Result<ProfileInfo, ProfileError> {
        if !self.settings.has_session() {
            engine_error!("NON_VALID_SESSION");
            return Err(ProfileError::NoValidSession);
        }

        let url = self
            .encoder
            .encode(OperationKind::ProfileInfo, &params(json!({ "username": username })))?;
        let mut failures: u32 = 0;
        let mut throttles: u32 = 0;
        loop {
            let outcome = self
                .get(&url)
                .await
                .and_then(|response| classify_profile(&response));
            let err = match outcome {
                Ok(profile) => {
                    engine_info!("profile {} resolved (id {})", username, profile.id);
                    return Ok(profile);
                }
                Err(err) => err,
            };

            match err.kind {
                FailureKind::Cancelled => return Err(ProfileError::Cancelled),
                FailureKind::NotFound => {
                    engine_error!("USER_NOT_FOUND {}", username);
                    return Err(ProfileError::NotFound {
                        username: username.to_string(),
                    });
                }
                FailureKind::RateLimited => {
                    throttles += 1;
                    if self
                        .settings
                        .max_rate_limit_retries
                        .is_some_and(|max| throttles > max)
                    {
                        return Err(ProfileError::RetriesExhausted {
                            username: username.to_string(),
                            attempts: throttles,
                            message: err.message,
                        });
                    }
                    engine_warn!("RATE_LIMITED [information] {}", username);
                    self.pause(self.settings.rate_limit_backoff).await?;
                }
                _ => {
                    failures += 1;
                    if self.settings.profile_retry.exhausted(failures) {
                        engine_error!("MAX_RETRIES {}: {}", username, err);
                        return Err(ProfileError::RetriesExhausted {
                            username: username.to_string(),
                            attempts: failures,
                            message: err.message,
                        });
                    }
                    engine_warn!("profile {} attempt {} failed: {}", username, failures, err);
                    self.pause(self.settings.profile_retry.delay).await?;
                }
            }
        }
    }

    pub async fn harvest_media(
        &self,
        profile: &ProfileInfo,
        request: &HarvestRequest,
    ) -> CollectionResult {
        self.harvest_profile(CollectionKind::Media, profile, request, profile.media_count)
            .await
    }

    pub async fn harvest_following(
        &self,
        profile: &ProfileInfo,
        request: &HarvestRequest,
    ) -> CollectionResult {
        self.harvest_profile(
            CollectionKind::Following,
            profile,
            request,
            profile.following_count,
        )
        .await
    }

    pub async fn harvest_followers(
        &self,
        profile: &ProfileInfo,
        request: &HarvestRequest,
    ) -> CollectionResult {
        self.harvest_profile(
            CollectionKind::Followers,
            profile,
            request,
            profile.follower_count,
        )
        .await
    }

    /// Explore feed of the session's own account. A zero total asks for one
    /// page; an empty cursor starts from [`EXPLORE_START_CURSOR`].
    pub async fn harvest_explore(&self, request: &HarvestRequest) -> CollectionResult {
        let resource = self.settings.viewer_id().unwrap_or("explore").to_string();
        let total = one_page_if_zero(request);
        let mut target = request.for_resource(resource.clone(), total);
        if target.start_cursor.is_empty() {
            target.start_cursor = EXPLORE_START_CURSOR.to_string();
        }
        let owner = OwnerContext::new(resource);
        self.harvester(CollectionKind::Explore)
            .run(&target, &owner, &self.cancel)
            .await
    }

    /// Media posted under `tag`. A zero total asks for one page.
    pub async fn harvest_hashtag(&self, tag: &str, request: &HarvestRequest) -> CollectionResult {
        let tag = tag.trim_start_matches('#');
        let total = one_page_if_zero(request);
        let target = request.for_resource(tag, total);
        let owner = OwnerContext::new(tag).with_username(format!("#{tag}"));
        self.harvester(CollectionKind::Hashtag)
            .run(&target, &owner, &self.cancel)
            .await
    }

    async fn harvest_profile(
        &self,
        kind: CollectionKind,
        profile: &ProfileInfo,
        request: &HarvestRequest,
        available: u32,
    ) -> CollectionResult {
        if !profile.is_accessible_to(self.settings.viewer_id()) {
            engine_error!("<{}> PRIVATE_USER", profile.username);
            return CollectionResult::early(
                HarvestStatus::Inaccessible,
                vec![ErrorEntry::new(
                    ErrorKind::PrivateOrInaccessible,
                    "PRIVATE_USER",
                    Utc::now(),
                )],
            );
        }

        let total = if request.total_wanted == 0 {
            available
        } else {
            request.total_wanted
        };
        let target = request.for_resource(profile.id.clone(), total);
        let owner = OwnerContext::new(profile.id.clone()).with_username(profile.username.clone());
        self.harvester(kind).run(&target, &owner, &self.cancel).await
    }

    fn harvester(&self, kind: CollectionKind) -> Harvester {
        let fetcher = Arc::new(GraphPageFetcher::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.encoder),
            kind,
        ));
        let normalizer: Arc<dyn ItemNormalizer> = match kind {
            CollectionKind::Following | CollectionKind::Followers => Arc::new(EdgeNormalizer),
            CollectionKind::Media | CollectionKind::Explore | CollectionKind::Hashtag => {
                Arc::new(MediaNormalizer::new(
                    Arc::clone(&self.details),
                    self.settings.detail_retry,
                ))
            }
        };
        Harvester::new(kind, fetcher, normalizer, self.gate.clone())
            .with_options(HarvestOptions::from(&self.settings))
            .with_sink(Arc::clone(&self.sink))
    }

    /// Current story reel of `profile`; an absent reel is an empty bundle.
    pub async fn fetch_story(&self, profile: &ProfileInfo) -> Result<StoryBundle, FetchError> {
        if !profile.is_accessible_to(self.settings.viewer_id()) {
            return Err(FetchError::new(
                FailureKind::PrivateOrInaccessible,
                "PRIVATE_USER",
            ));
        }
        let url = self.encoder.encode(
            OperationKind::StoryPage,
            &params(json!({ "reel_ids": [profile.id], "precomposed_overlay": false })),
        )?;
        let envelope = self.get_json(&url, "story").await?;

        let reel = envelope
            .pointer("/data/reels_media")
            .and_then(Value::as_array)
            .and_then(|reels| reels.first());
        let Some(reel) = reel else {
            engine_info!("no story reel for {}", profile.username);
            return Ok(StoryBundle {
                username: profile.username.clone(),
                ..StoryBundle::default()
            });
        };

        let bundle = StoryBundle {
            username: reel
                .pointer("/user/username")
                .and_then(Value::as_str)
                .unwrap_or(&profile.username)
                .to_string(),
            latest_reel_media: reel.get("latest_reel_media").and_then(Value::as_i64),
            expiring_at: reel.get("expiring_at").and_then(Value::as_i64),
            seen: reel.get("seen").and_then(Value::as_i64),
            items: reel
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        };
        engine_info!("story of {}: {} items", bundle.username, bundle.count());
        Ok(bundle)
    }

    /// Follow requests and activity feed of the session's own account.
    pub async fn fetch_notifications(&self) -> Result<NotificationFeed, FetchError> {
        let url = self
            .encoder
            .encode(OperationKind::NotificationFeed, &QueryParams::new())?;
        let envelope = self.get_json(&url, "notifications").await?;
        let user = envelope
            .pointer("/graphql/user")
            .ok_or_else(|| FetchError::malformed("notification user block missing"))?;

        let follow_requests = user
            .pointer("/edge_follow_requests/edges")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| FetchError::malformed("follow requests missing"))?;
        let feed = user
            .pointer("/activity_feed")
            .ok_or_else(|| FetchError::malformed("activity feed missing"))?;
        let notifications = feed
            .pointer("/edge_web_activity_feed/edges")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| FetchError::malformed("activity edges missing"))?;
        let notification_count = feed
            .pointer("/edge_web_activity_feed/count")
            .and_then(Value::as_u64)
            .unwrap_or(notifications.len() as u64);

        Ok(NotificationFeed {
            follow_requests,
            notifications,
            notification_count,
            timestamp: feed.get("timestamp").and_then(Value::as_f64),
        })
    }

    /// Raw blended search answer for `query`.
    pub async fn search(&self, query: &str) -> Result<Value, FetchError> {
        let url = self
            .encoder
            .encode(OperationKind::Search, &params(json!({ "query": query })))?;
        self.get_json(&url, "search").await
    }

    async fn get_json(&self, url: &Url, what: &str) -> Result<Value, FetchError> {
        let response = self.get(url).await?;
        if let Some(kind) = classify_status(response.status) {
            return Err(FetchError::new(
                kind,
                format!("{what} returned {}", response.status),
            ));
        }
        Ok(response_json(&response)?)
    }
}

fn params(value: Value) -> QueryParams {
    match value {
        Value::Object(map) => map,
        _ => QueryParams::new(),
    }
}

fn one_page_if_zero(request: &HarvestRequest) -> u32 {
    if request.total_wanted == 0 {
        request.page_size
    } else {
        request.total_wanted
    }
}
