use std::sync::Arc;

use harvester_engine::{
    CollectionKind, FailureKind, GraphPageFetcher, GraphQueryEncoder, OperationHashes,
    PageFetcher, QueryEncoder, ReqwestTransport, Transport, TransportSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches the JSON `variables` query parameter structurally.
struct Variables(serde_json::Value);

impl Match for Variables {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .find(|(key, _)| key == "variables")
            .and_then(|(_, value)| serde_json::from_str::<serde_json::Value>(&value).ok())
            .is_some_and(|value| value == self.0)
    }
}

fn fetcher(server: &MockServer, collection: CollectionKind) -> GraphPageFetcher {
    let settings = TransportSettings {
        session_cookie: Some("sessionid=abc; ds_user_id=7".into()),
        ..TransportSettings::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(settings).unwrap());
    let encoder: Arc<dyn QueryEncoder> =
        Arc::new(GraphQueryEncoder::new(&server.uri(), OperationHashes::default()).unwrap());
    GraphPageFetcher::new(transport, encoder, collection)
}

fn media_page(ids: &[&str], cursor: Option<&str>) -> serde_json::Value {
    json!({
        "status": "ok",
        "data": {"user": {"edge_owner_to_timeline_media": {
            "count": 120,
            "page_info": {"has_next_page": cursor.is_some(), "end_cursor": cursor},
            "edges": ids.iter().map(|id| json!({"node": {"id": id}})).collect::<Vec<_>>()
        }}}
    })
}

#[tokio::test]
async fn media_page_sends_variables_and_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "42323d64886122307be10013ad2dcc44"))
        .and(Variables(json!({"id": "42", "first": 50, "after": "QVFD"})))
        .and(header("cookie", "sessionid=abc; ds_user_id=7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(media_page(&["1", "2"], Some("QVFE"))))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher(&server, CollectionKind::Media)
        .fetch("42", "QVFD", 50)
        .await
        .expect("page");
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0]["id"], "1");
    assert_eq!(page.next_cursor.as_deref(), Some("QVFE"));
    assert!(page.has_more);
}

#[tokio::test]
async fn throttled_status_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = fetcher(&server, CollectionKind::Followers)
        .fetch("42", "", 50)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::RateLimited);
}

#[tokio::test]
async fn fail_envelope_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "fail", "message": "Please wait a few minutes"})),
        )
        .mount(&server)
        .await;

    let err = fetcher(&server, CollectionKind::Following)
        .fetch("42", "", 50)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::RateLimited);
}

#[tokio::test]
async fn html_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>login</html>", "text/html"))
        .mount(&server)
        .await;

    let err = fetcher(&server, CollectionKind::Explore)
        .fetch("7", "", 24)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Malformed);
}

#[tokio::test]
async fn missing_and_forbidden_resources_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(Variables(json!({"tag_name": "nothing", "first": 50, "after": ""})))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(Variables(json!({"id": "99", "first": 50, "after": ""})))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = fetcher(&server, CollectionKind::Hashtag)
        .fetch("nothing", "", 50)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::NotFound);

    let err = fetcher(&server, CollectionKind::Media)
        .fetch("99", "", 50)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::PrivateOrInaccessible);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
        .mount(&server)
        .await;

    let settings = TransportSettings {
        max_bytes: 1024,
        ..TransportSettings::default()
    };
    let transport = ReqwestTransport::new(settings).unwrap();
    let url = url::Url::parse(&server.uri()).unwrap();
    let err = transport.get(&url).await.unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 1024, .. }));
}
