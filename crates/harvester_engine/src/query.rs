use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use url::Url;

use crate::{FailureKind, FetchError};

pub type QueryParams = Map<String, Value>;

/// Remote operations the engine knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ProfileInfo,
    MediaPage,
    FollowingPage,
    FollowerPage,
    ExplorePage,
    HashtagPage,
    StoryPage,
    NotificationFeed,
    Search,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::ProfileInfo => "profile-info",
            OperationKind::MediaPage => "media-page",
            OperationKind::FollowingPage => "following-page",
            OperationKind::FollowerPage => "follower-page",
            OperationKind::ExplorePage => "explore-page",
            OperationKind::HashtagPage => "hashtag-page",
            OperationKind::StoryPage => "story-page",
            OperationKind::NotificationFeed => "notification-feed",
            OperationKind::Search => "search",
        };
        f.write_str(name)
    }
}

/// Versioned query identifiers of the paginated graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHashes(HashMap<OperationKind, String>);

impl Default for OperationHashes {
    fn default() -> Self {
        let pairs = [
            (OperationKind::StoryPage, "45246d3fe16ccc6577e0bd297a5db1ab"),
            (OperationKind::ExplorePage, "df0dcc250c2b18d9fd27c5581ef33c7c"),
            (OperationKind::HashtagPage, "ded47faa9a1aaded10161a2ff32abb6b"),
            (OperationKind::MediaPage, "42323d64886122307be10013ad2dcc44"),
            (OperationKind::FollowerPage, "37479f2b8209594dde7facb0d904896a"),
            (OperationKind::FollowingPage, "58712303d941c6855d4e888c5f0cd22f"),
        ];
        Self(
            pairs
                .into_iter()
                .map(|(kind, hash)| (kind, hash.to_string()))
                .collect(),
        )
    }
}

impl OperationHashes {
    pub fn get(&self, kind: OperationKind) -> Option<&str> {
        self.0.get(&kind).map(String::as_str)
    }

    pub fn set(&mut self, kind: OperationKind, hash: impl Into<String>) {
        self.0.insert(kind, hash.into());
    }
}

/// Turns an operation and its parameters into a request URL.
pub trait QueryEncoder: Send + Sync {
    fn encode(&self, kind: OperationKind, params: &QueryParams) -> Result<Url, FetchError>;

    /// URL of a post's detail page.
    fn detail_url(&self, short_code: &str) -> Result<Url, FetchError>;
}

/// Encoder for the service's `graphql/query` endpoint and its page-style siblings.
#[derive(Debug, Clone)]
pub struct GraphQueryEncoder {
    base: Url,
    hashes: OperationHashes,
}

impl GraphQueryEncoder {
    pub fn new(base_url: &str, hashes: OperationHashes) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, hashes })
    }

    fn join(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    fn graph_query(&self, kind: OperationKind, params: &QueryParams) -> Result<Url, FetchError> {
        let hash = self.hashes.get(kind).ok_or_else(|| {
            FetchError::new(FailureKind::InvalidUrl, format!("no query hash for {kind}"))
        })?;
        let variables = serde_json::to_string(params)
            .map_err(|err| FetchError::malformed(err.to_string()))?;
        let mut url = self.join("graphql/query/")?;
        url.query_pairs_mut()
            .append_pair("query_hash", hash)
            .append_pair("variables", &variables);
        Ok(url)
    }
}

fn string_param<'a>(params: &'a QueryParams, key: &str) -> Result<&'a str, FetchError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::new(FailureKind::InvalidUrl, format!("missing `{key}` parameter")))
}

impl QueryEncoder for GraphQueryEncoder {
    fn encode(&self, kind: OperationKind, params: &QueryParams) -> Result<Url, FetchError> {
        match kind {
            OperationKind::ProfileInfo => {
                let username = string_param(params, "username")?;
                let mut url = self.join(&format!("{username}/"))?;
                url.query_pairs_mut().append_pair("__a", "1");
                Ok(url)
            }
            OperationKind::NotificationFeed => {
                let mut url = self.join("accounts/activity/")?;
                url.query_pairs_mut().append_pair("__a", "1");
                Ok(url)
            }
            OperationKind::Search => {
                let query = string_param(params, "query")?;
                let mut url = self.join("web/search/topsearch/")?;
                url.query_pairs_mut()
                    .append_pair("context", "blended")
                    .append_pair("query", query);
                Ok(url)
            }
            OperationKind::MediaPage
            | OperationKind::FollowingPage
            | OperationKind::FollowerPage
            | OperationKind::ExplorePage
            | OperationKind::HashtagPage
            | OperationKind::StoryPage => self.graph_query(kind, params),
        }
    }

    fn detail_url(&self, short_code: &str) -> Result<Url, FetchError> {
        self.join(&format!("p/{short_code}"))
    }
}
