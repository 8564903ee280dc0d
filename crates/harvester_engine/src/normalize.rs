use std::sync::Arc;

use harvester_core::{
    CanonicalRecord, Dimensions, EdgeRecord, MediaKind, MediaRecord, ThumbnailLink,
};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::detail::{DetailPage, DetailSource};
use crate::retry::retry_with;
use crate::{FetchError, RetryPolicy};

const CAROUSEL_TYPE: &str = "GraphSidecar";

/// Who the items of a harvest belong to; used for labels and log lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnerContext {
    pub resource_id: String,
    pub username: Option<String>,
}

impl OwnerContext {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn label(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.resource_id)
    }
}

/// Turns one raw page item into zero or more canonical records.
#[async_trait::async_trait]
pub trait ItemNormalizer: Send + Sync {
    async fn normalize(
        &self,
        item: &Value,
        owner: &OwnerContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError>;
}

#[derive(Debug, Deserialize, Default)]
struct Count {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct OwnerRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TextEdge {
    node: TextNode,
}

#[derive(Debug, Deserialize, Default)]
struct CaptionEdges {
    #[serde(default)]
    edges: Vec<TextEdge>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    src: String,
    #[serde(default)]
    config_width: u32,
    #[serde(default)]
    config_height: u32,
}

impl From<Resource> for ThumbnailLink {
    fn from(resource: Resource) -> Self {
        ThumbnailLink {
            src: resource.src,
            width: resource.config_width,
            height: resource.config_height,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MediaNode {
    id: String,
    #[serde(rename = "__typename")]
    type_name: String,
    shortcode: String,
    owner: OwnerRef,
    #[serde(default)]
    edge_media_to_caption: CaptionEdges,
    #[serde(default)]
    edge_media_to_comment: Count,
    #[serde(default)]
    edge_media_preview_like: Count,
    #[serde(default)]
    taken_at_timestamp: i64,
    #[serde(default)]
    is_video: bool,
    #[serde(default)]
    dimensions: Dimensions,
    #[serde(default)]
    comments_disabled: bool,
    #[serde(default)]
    thumbnail_resources: Vec<Resource>,
    #[serde(default)]
    gating_info: Value,
    #[serde(default)]
    display_url: String,
}

#[derive(Debug, Deserialize)]
struct ChildNode {
    id: String,
    #[serde(rename = "__typename")]
    type_name: String,
    shortcode: String,
    #[serde(default)]
    is_video: bool,
    #[serde(default)]
    dimensions: Dimensions,
    #[serde(default)]
    display_resources: Vec<Resource>,
    #[serde(default)]
    gating_info: Value,
    #[serde(default)]
    display_url: String,
    #[serde(default)]
    video_url: Option<String>,
}

fn gating(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl MediaNode {
    fn caption(&self) -> String {
        self.edge_media_to_caption
            .edges
            .first()
            .map(|edge| edge.node.text.clone())
            .unwrap_or_default()
    }

    fn into_record(self, kind: MediaKind, resolved_media_url: String) -> MediaRecord {
        let caption = self.caption();
        MediaRecord {
            id: self.id,
            kind,
            type_name: self.type_name,
            short_code: self.shortcode,
            owner_id: self.owner.id,
            caption,
            comment_count: self.edge_media_to_comment.count,
            like_count: self.edge_media_preview_like.count,
            taken_at: self.taken_at_timestamp,
            is_video: self.is_video,
            dimensions: self.dimensions,
            comments_disabled: self.comments_disabled,
            thumbnail_links: self.thumbnail_resources.into_iter().map(Into::into).collect(),
            gating_info: gating(self.gating_info),
            resolved_media_url,
        }
    }

    /// A child record: own media identity, parent's caption, owner and engagement.
    fn child_record(&self, child: ChildNode) -> MediaRecord {
        let resolved_media_url = match child.video_url {
            Some(url) if child.is_video && !url.is_empty() => url,
            _ => child.display_url,
        };
        MediaRecord {
            id: child.id,
            kind: MediaKind::CarouselChild,
            type_name: child.type_name,
            short_code: child.shortcode,
            owner_id: self.owner.id.clone(),
            caption: self.caption(),
            comment_count: self.edge_media_to_comment.count,
            like_count: self.edge_media_preview_like.count,
            taken_at: self.taken_at_timestamp,
            is_video: child.is_video,
            dimensions: child.dimensions,
            comments_disabled: self.comments_disabled,
            thumbnail_links: child.display_resources.into_iter().map(Into::into).collect(),
            gating_info: gating(child.gating_info),
            resolved_media_url,
        }
    }
}

/// Normalizer for media posts. Videos and carousels need the post's detail page,
/// fetched under `retry`.
pub struct MediaNormalizer {
    details: Arc<dyn DetailSource>,
    retry: RetryPolicy,
}

impl MediaNormalizer {
    pub fn new(details: Arc<dyn DetailSource>, retry: RetryPolicy) -> Self {
        Self { details, retry }
    }

    async fn resolve<T, F>(
        &self,
        short_code: &str,
        cancel: &CancellationToken,
        extract: F,
    ) -> Result<T, FetchError>
    where
        F: Fn(DetailPage) -> Result<T, FetchError>,
    {
        let label = format!("detail {short_code}");
        let extract = &extract;
        retry_with(&label, &self.retry, cancel, move || async move {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::cancelled()),
                page = self.details.fetch_detail(short_code) => page?,
            };
            extract(page)
        })
        .await
    }
}

#[async_trait::async_trait]
impl ItemNormalizer for MediaNormalizer {
    async fn normalize(
        &self,
        item: &Value,
        _owner: &OwnerContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let node = MediaNode::deserialize(item)
            .map_err(|err| FetchError::malformed(format!("media node: {err}")))?;

        if node.type_name == CAROUSEL_TYPE {
            let children = self
                .resolve(&node.shortcode, cancel, |page| {
                    page.carousel_children.ok_or_else(|| {
                        FetchError::malformed("carousel payload missing from detail page")
                    })
                })
                .await?;
            return children
                .iter()
                .map(|child| {
                    let child = ChildNode::deserialize(child)
                        .map_err(|err| FetchError::malformed(format!("carousel child: {err}")))?;
                    Ok(node.child_record(child).into())
                })
                .collect();
        }

        if node.is_video {
            let url = self
                .resolve(&node.shortcode, cancel, |page| {
                    page.video_url
                        .ok_or_else(|| FetchError::malformed("video url missing from detail page"))
                })
                .await?;
            return Ok(vec![node.into_record(MediaKind::Video, url).into()]);
        }

        let url = node.display_url.clone();
        Ok(vec![node.into_record(MediaKind::Image, url).into()])
    }
}

#[derive(Debug, Deserialize)]
struct AccountNode {
    id: String,
    username: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    profile_pic_url: String,
    #[serde(default)]
    is_verified: bool,
    #[serde(default)]
    followed_by_viewer: bool,
    #[serde(default)]
    requested_by_viewer: bool,
}

/// Normalizer for follower/following accounts. Never fetches.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeNormalizer;

#[async_trait::async_trait]
impl ItemNormalizer for EdgeNormalizer {
    async fn normalize(
        &self,
        item: &Value,
        _owner: &OwnerContext,
        _cancel: &CancellationToken,
    ) -> Result<Vec<CanonicalRecord>, FetchError> {
        let node = AccountNode::deserialize(item)
            .map_err(|err| FetchError::malformed(format!("account node: {err}")))?;
        Ok(vec![EdgeRecord {
            id: node.id,
            username: node.username,
            full_name: node.full_name,
            small_avatar_url: node.profile_pic_url,
            verified: node.is_verified,
            followed_by_viewer: node.followed_by_viewer,
            requested_by_viewer: node.requested_by_viewer,
        }
        .into()])
    }
}
