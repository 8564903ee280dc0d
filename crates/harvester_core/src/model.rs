use serde::{Deserialize, Serialize};

/// Shape of a harvested media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    CarouselChild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One rendition of a media item (thumbnail or display resource).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailLink {
    pub src: String,
    pub width: u32,
    pub height: u32,
}

/// Canonical media post (or carousel child) with its resolved download URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub kind: MediaKind,
    /// Remote type name as reported by the service (`GraphImage`, ...).
    pub type_name: String,
    pub short_code: String,
    pub owner_id: String,
    pub caption: String,
    pub comment_count: u64,
    pub like_count: u64,
    pub taken_at: i64,
    pub is_video: bool,
    pub dimensions: Dimensions,
    pub comments_disabled: bool,
    pub thumbnail_links: Vec<ThumbnailLink>,
    /// Compact JSON of the service's gating block, kept opaque.
    pub gating_info: Option<String>,
    pub resolved_media_url: String,
}

/// Canonical follower/following account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub small_avatar_url: String,
    pub verified: bool,
    /// The viewing session follows this account.
    pub followed_by_viewer: bool,
    pub requested_by_viewer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Media(MediaRecord),
    Edge(EdgeRecord),
}

impl CanonicalRecord {
    pub fn id(&self) -> &str {
        match self {
            CanonicalRecord::Media(media) => &media.id,
            CanonicalRecord::Edge(edge) => &edge.id,
        }
    }

    pub fn as_media(&self) -> Option<&MediaRecord> {
        match self {
            CanonicalRecord::Media(media) => Some(media),
            CanonicalRecord::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeRecord> {
        match self {
            CanonicalRecord::Edge(edge) => Some(edge),
            CanonicalRecord::Media(_) => None,
        }
    }
}

impl From<MediaRecord> for CanonicalRecord {
    fn from(record: MediaRecord) -> Self {
        CanonicalRecord::Media(record)
    }
}

impl From<EdgeRecord> for CanonicalRecord {
    fn from(record: EdgeRecord) -> Self {
        CanonicalRecord::Edge(record)
    }
}

/// Basic profile information, resolved before any collection harvest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub media_count: u32,
    pub follower_count: u32,
    pub following_count: u32,
    pub avatar_url: String,
    pub avatar_url_hd: String,
    pub biography: String,
    pub is_private: bool,
    pub is_verified: bool,
    pub followed_by_viewer: bool,
}

impl ProfileInfo {
    /// Whether the current session can see this profile's collections.
    ///
    /// Private profiles are visible when the viewer follows them or is them.
    pub fn is_accessible_to(&self, viewer_id: Option<&str>) -> bool {
        !self.is_private || self.followed_by_viewer || viewer_id == Some(self.id.as_str())
    }
}

/// Current story reel of one profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoryBundle {
    pub username: String,
    pub latest_reel_media: Option<i64>,
    pub expiring_at: Option<i64>,
    pub seen: Option<i64>,
    pub items: Vec<serde_json::Value>,
}

impl StoryBundle {
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Activity feed of the session's own account.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationFeed {
    pub follow_requests: Vec<serde_json::Value>,
    pub notifications: Vec<serde_json::Value>,
    pub notification_count: u64,
    pub timestamp: Option<f64>,
}
