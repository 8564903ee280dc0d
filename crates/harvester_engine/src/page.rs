use std::sync::Arc;

use engine_logging::engine_debug;
use serde_json::{json, Value};

use crate::decode::response_json;
use crate::query::{OperationKind, QueryEncoder, QueryParams};
use crate::{CollectionKind, FailureKind, FetchError, RawPage, Transport, TransportResponse};

/// Fetches one page of a paginated collection.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        resource_id: &str,
        cursor: &str,
        page_size: u32,
    ) -> Result<RawPage, FetchError>;
}

impl CollectionKind {
    pub fn operation(self) -> OperationKind {
        match self {
            CollectionKind::Media => OperationKind::MediaPage,
            CollectionKind::Following => OperationKind::FollowingPage,
            CollectionKind::Followers => OperationKind::FollowerPage,
            CollectionKind::Explore => OperationKind::ExplorePage,
            CollectionKind::Hashtag => OperationKind::HashtagPage,
        }
    }

    /// JSON pointer of the connection object inside the page envelope.
    pub fn data_pointer(self) -> &'static str {
        match self {
            CollectionKind::Media => "/data/user/edge_owner_to_timeline_media",
            CollectionKind::Following => "/data/user/edge_follow",
            CollectionKind::Followers => "/data/user/edge_followed_by",
            CollectionKind::Explore => "/data/user/edge_web_discover_media",
            CollectionKind::Hashtag => "/data/hashtag/edge_hashtag_to_media",
        }
    }

    fn variables(self, resource_id: &str, cursor: &str, page_size: u32) -> QueryParams {
        let value = match self {
            CollectionKind::Media | CollectionKind::Following | CollectionKind::Followers => {
                json!({ "id": resource_id, "first": page_size, "after": cursor })
            }
            CollectionKind::Explore => json!({ "first": page_size, "after": cursor }),
            CollectionKind::Hashtag => {
                json!({ "tag_name": resource_id, "first": page_size, "after": cursor })
            }
        };
        match value {
            Value::Object(map) => map,
            _ => QueryParams::new(),
        }
    }
}

/// Page fetcher for the graph query endpoint of one collection.
#[derive(Clone)]
pub struct GraphPageFetcher {
    transport: Arc<dyn Transport>,
    encoder: Arc<dyn QueryEncoder>,
    collection: CollectionKind,
}

impl GraphPageFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        encoder: Arc<dyn QueryEncoder>,
        collection: CollectionKind,
    ) -> Self {
        Self {
            transport,
            encoder,
            collection,
        }
    }

    pub fn collection(&self) -> CollectionKind {
        self.collection
    }
}

#[async_trait::async_trait]
impl PageFetcher for GraphPageFetcher {
    async fn fetch(
        &self,
        resource_id: &str,
        cursor: &str,
        page_size: u32,
    ) -> Result<RawPage, FetchError> {
        let params = self.collection.variables(resource_id, cursor, page_size);
        let url = self.encoder.encode(self.collection.operation(), &params)?;
        let response = self.transport.get(&url).await?;
        let page = classify_page(self.collection, &response)?;
        engine_debug!(
            "{} page for {}: {} items, has_more={}",
            self.collection,
            resource_id,
            page.items.len(),
            page.has_more
        );
        Ok(page)
    }
}

/// Map an HTTP status onto the failure taxonomy. `None` for 2xx.
pub fn classify_status(status: u16) -> Option<FailureKind> {
    match status {
        200..=299 => None,
        429 => Some(FailureKind::RateLimited),
        404 => Some(FailureKind::NotFound),
        401 | 403 => Some(FailureKind::PrivateOrInaccessible),
        other => Some(FailureKind::HttpStatus(other)),
    }
}

/// Decode and classify a page envelope.
pub fn classify_page(
    collection: CollectionKind,
    response: &TransportResponse,
) -> Result<RawPage, FetchError> {
    if let Some(kind) = classify_status(response.status) {
        return Err(FetchError::new(
            kind,
            format!("{collection} page returned {}", response.status),
        ));
    }

    let envelope = response_json(response)?;
    if envelope.get("status").and_then(Value::as_str) != Some("ok") {
        return Err(FetchError::new(
            FailureKind::RateLimited,
            format!("{collection} envelope status is not ok"),
        ));
    }

    // The service drops the data block entirely when throttling.
    let connection = match envelope.pointer(collection.data_pointer()) {
        Some(value) if value.is_object() => value,
        _ => {
            return Err(FetchError::new(
                FailureKind::RateLimited,
                format!("{collection} data missing from envelope"),
            ))
        }
    };

    let page_info = connection
        .get("page_info")
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::malformed(format!("{collection} page_info missing")))?;
    let edges = connection
        .get("edges")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::malformed(format!("{collection} edges missing")))?;

    let items = edges
        .iter()
        .map(|edge| edge.get("node").cloned().unwrap_or(Value::Null))
        .collect();
    let next_cursor = page_info
        .get("end_cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string);
    let has_more = page_info
        .get("has_next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(RawPage {
        items,
        next_cursor,
        has_more,
    })
}
