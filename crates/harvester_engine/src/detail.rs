use std::sync::Arc;

use engine_logging::engine_trace;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::decode::response_text;
use crate::page::classify_status;
use crate::query::QueryEncoder;
use crate::{FetchError, Transport};

const DATA_MARKER: &str = "Data =";
const CHILDREN_POINTER: &str =
    "/entry_data/PostPage/0/graphql/shortcode_media/edge_sidecar_to_children/edges";

/// What a post's detail page reveals about its media.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailPage {
    /// Playable URL from the `og:video:secure_url` meta tag.
    pub video_url: Option<String>,
    /// Child nodes of a carousel post, if the embedded payload was found.
    pub carousel_children: Option<Vec<Value>>,
}

pub trait DetailPageDecoder: Send + Sync {
    fn decode(&self, html: &str) -> DetailPage;
}

/// Reads the video meta tag and the JSON assigned after `Data =` in a script element.
///
/// Preferred script positions are tried first, then every script in document order.
#[derive(Debug, Clone)]
pub struct ScriptJsonDecoder {
    preferred_indices: Vec<usize>,
}

impl ScriptJsonDecoder {
    pub fn new(preferred_indices: Vec<usize>) -> Self {
        Self { preferred_indices }
    }
}

impl Default for ScriptJsonDecoder {
    fn default() -> Self {
        Self::new(vec![3, 4])
    }
}

impl DetailPageDecoder for ScriptJsonDecoder {
    fn decode(&self, html: &str) -> DetailPage {
        let doc = Html::parse_document(html);
        let meta_sel = Selector::parse(r#"meta[property="og:video:secure_url"]"#).ok();
        let script_sel = Selector::parse("script").ok();

        let video_url = meta_sel
            .as_ref()
            .and_then(|sel| doc.select(sel).next())
            .and_then(|meta| meta.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string);

        let scripts: Vec<String> = script_sel
            .as_ref()
            .map(|sel| {
                doc.select(sel)
                    .map(|script| script.text().collect::<String>())
                    .collect()
            })
            .unwrap_or_default();

        let preferred = self
            .preferred_indices
            .iter()
            .filter_map(|&idx| scripts.get(idx));
        let carousel_children = preferred
            .chain(scripts.iter())
            .find_map(|script| carousel_children(script));

        DetailPage {
            video_url,
            carousel_children,
        }
    }
}

fn carousel_children(script: &str) -> Option<Vec<Value>> {
    let (_, payload) = script.split_once(DATA_MARKER)?;
    let payload = payload.trim().trim_end_matches(';').trim_end();
    let data: Value = serde_json::from_str(payload).ok()?;
    let edges = data.pointer(CHILDREN_POINTER)?.as_array()?;
    Some(
        edges
            .iter()
            .filter_map(|edge| edge.get("node").cloned())
            .collect(),
    )
}

/// Secondary per-item fetch of a post's detail page.
#[async_trait::async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, short_code: &str) -> Result<DetailPage, FetchError>;
}

pub struct HttpDetailSource {
    transport: Arc<dyn Transport>,
    encoder: Arc<dyn QueryEncoder>,
    decoder: Arc<dyn DetailPageDecoder>,
}

impl HttpDetailSource {
    pub fn new(
        transport: Arc<dyn Transport>,
        encoder: Arc<dyn QueryEncoder>,
        decoder: Arc<dyn DetailPageDecoder>,
    ) -> Self {
        Self {
            transport,
            encoder,
            decoder,
        }
    }
}

#[async_trait::async_trait]
impl DetailSource for HttpDetailSource {
    async fn fetch_detail(&self, short_code: &str) -> Result<DetailPage, FetchError> {
        let url = self.encoder.detail_url(short_code)?;
        let response = self.transport.get(&url).await?;
        if let Some(kind) = classify_status(response.status) {
            return Err(FetchError::new(
                kind,
                format!("detail page {short_code} returned {}", response.status),
            ));
        }
        let html = response_text(&response)?;
        let page = self.decoder.decode(&html);
        engine_trace!(
            "detail {}: video={} children={:?}",
            short_code,
            page.video_url.is_some(),
            page.carousel_children.as_ref().map(Vec::len)
        );
        Ok(page)
    }
}
