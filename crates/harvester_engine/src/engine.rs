use std::sync::Arc;

use harvester_core::{CollectionResult, NotificationFeed, ProfileInfo, StoryBundle};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{GraphClient, ProfileError};
use crate::{FetchError, HarvestRequest, HarvestSettings, ProgressSink};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to build client: {0}")]
    Client(#[from] FetchError),
}

/// Blocking front for callers without an async runtime. Each call blocks
/// until its harvest drains; internal page tasks still run concurrently.
pub struct EngineHandle {
    runtime: tokio::runtime::Runtime,
    client: GraphClient,
}

impl EngineHandle {
    pub fn new(settings: HarvestSettings) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("harvester-worker")
            .build()?;
        let client = {
            let _guard = runtime.enter();
            GraphClient::new(settings)?
        };
        Ok(Self { runtime, client })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.client = self.client.with_sink(sink);
        self
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.client.cancel_token()
    }

    pub fn fetch_profile(&self, username: &str) -> Result<ProfileInfo, ProfileError> {
        self.runtime.block_on(self.client.fetch_profile(username))
    }

    pub fn harvest_media(&self, profile: &ProfileInfo, request: &HarvestRequest) -> CollectionResult {
        self.runtime
            .block_on(self.client.harvest_media(profile, request))
    }

    pub fn harvest_following(
        &self,
        profile: &ProfileInfo,
        request: &HarvestRequest,
    ) -> CollectionResult {
        self.runtime
            .block_on(self.client.harvest_following(profile, request))
    }

    pub fn harvest_followers(
        &self,
        profile: &ProfileInfo,
        request: &HarvestRequest,
    ) -> CollectionResult {
        self.runtime
            .block_on(self.client.harvest_followers(profile, request))
    }

    pub fn harvest_explore(&self, request: &HarvestRequest) -> CollectionResult {
        self.runtime.block_on(self.client.harvest_explore(request))
    }

    pub fn harvest_hashtag(&self, tag: &str, request: &HarvestRequest) -> CollectionResult {
        self.runtime
            .block_on(self.client.harvest_hashtag(tag, request))
    }

    pub fn fetch_story(&self, profile: &ProfileInfo) -> Result<StoryBundle, FetchError> {
        self.runtime.block_on(self.client.fetch_story(profile))
    }

    pub fn fetch_notifications(&self) -> Result<NotificationFeed, FetchError> {
        self.runtime.block_on(self.client.fetch_notifications())
    }

    pub fn search(&self, query: &str) -> Result<Value, FetchError> {
        self.runtime.block_on(self.client.search(query))
    }
}
