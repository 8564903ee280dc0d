use std::time::Duration;

use harvester_core::{ErrorKind, HarvestStatus, MediaKind, ProfileInfo};
use harvester_engine::{
    FailureKind, GraphClient, HarvestRequest, HarvestSettings, ProfileError, RetryPolicy,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches the decoded `variables` query parameter regardless of key order.
struct Variables(Value);

impl Match for Variables {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .find(|(key, _)| key == "variables")
            .and_then(|(_, value)| serde_json::from_str::<Value>(&value).ok())
            .is_some_and(|value| value == self.0)
    }
}

fn settings(server: &MockServer) -> HarvestSettings {
    HarvestSettings {
        base_url: server.uri(),
        session_cookie: Some("sessionid=s3cr3t; ds_user_id=7".into()),
        rate_limit_backoff: Duration::from_millis(5),
        profile_retry: RetryPolicy::bounded(3, Duration::from_millis(1)),
        detail_retry: RetryPolicy::bounded(3, Duration::from_millis(1)),
        ..HarvestSettings::default()
    }
}

fn client(server: &MockServer) -> GraphClient {
    GraphClient::new(settings(server)).expect("client")
}

fn profile_body(is_private: bool, media: u32) -> Value {
    json!({"graphql": {"user": {
        "id": "42",
        "username": "nasa",
        "full_name": "NASA",
        "edge_owner_to_timeline_media": {"count": media},
        "edge_follow": {"count": 80},
        "edge_followed_by": {"count": 1000},
        "profile_pic_url": "https://cdn.example/p.jpg",
        "profile_pic_url_hd": "https://cdn.example/p_hd.jpg",
        "biography": "Exploring the universe",
        "is_private": is_private,
        "is_verified": true,
        "followed_by_viewer": false
    }}})
}

fn media_node(id: &str, code: &str, is_video: bool) -> Value {
    json!({"node": {
        "id": id,
        "__typename": if is_video { "GraphVideo" } else { "GraphImage" },
        "shortcode": code,
        "owner": {"id": "42"},
        "edge_media_to_caption": {"edges": []},
        "edge_media_to_comment": {"count": 1},
        "edge_media_preview_like": {"count": 2},
        "taken_at_timestamp": 1_600_000_000,
        "is_video": is_video,
        "dimensions": {"height": 720, "width": 1280},
        "comments_disabled": false,
        "thumbnail_resources": [],
        "gating_info": null,
        "display_url": format!("https://cdn.example/{code}.jpg")
    }})
}

fn private_profile() -> ProfileInfo {
    ProfileInfo {
        id: "99".into(),
        username: "hidden".into(),
        media_count: 10,
        is_private: true,
        ..ProfileInfo::default()
    }
}

#[tokio::test]
async fn profile_is_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nasa/"))
        .and(query_param("__a", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body(false, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let profile = client(&server).fetch_profile("nasa").await.unwrap();
    assert_eq!(profile.id, "42");
    assert_eq!(profile.media_count, 3);
    assert_eq!(profile.follower_count, 1000);
    assert_eq!(profile.following_count, 80);
    assert_eq!(profile.avatar_url_hd, "https://cdn.example/p_hd.jpg");
    assert!(profile.is_verified);
}

#[tokio::test]
async fn broken_link_page_means_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ghost/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><h2>Sorry, this page isn't available.</h2>The link you followed may be broken</html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let err = client(&server).fetch_profile("ghost").await.unwrap_err();
    assert_eq!(
        err,
        ProfileError::NotFound {
            username: "ghost".into()
        }
    );
}

#[tokio::test]
async fn missing_session_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = GraphClient::new(HarvestSettings {
        session_cookie: None,
        ..settings(&server)
    })
    .unwrap();
    assert_eq!(
        client.fetch_profile("nasa").await.unwrap_err(),
        ProfileError::NoValidSession
    );
}

#[tokio::test]
async fn throttled_profile_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nasa/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nasa/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body(false, 0)))
        .mount(&server)
        .await;

    let profile = client(&server).fetch_profile("nasa").await.unwrap();
    assert_eq!(profile.username, "nasa");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn garbage_profile_gives_up_after_bounded_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nasa/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "text/plain"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).fetch_profile("nasa").await.unwrap_err();
    assert!(
        matches!(err, ProfileError::RetriesExhausted { attempts: 3, .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn private_profile_returns_early_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client(&server)
        .harvest_media(&private_profile(), &HarvestRequest::default())
        .await;
    assert_eq!(result.status, HarvestStatus::Inaccessible);
    assert!(result.records.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::PrivateOrInaccessible);
    assert_eq!(result.errors[0].message, "PRIVATE_USER");
}

#[tokio::test]
async fn own_private_profile_is_accessible() {
    let server = MockServer::start().await;
    let mut profile = private_profile();
    profile.id = "7".into();
    profile.following_count = 0;

    let result = client(&server)
        .harvest_following(&profile, &HarvestRequest::default())
        .await;
    assert_eq!(result.status, HarvestStatus::Complete);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn media_harvest_resolves_videos_from_detail_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "42323d64886122307be10013ad2dcc44"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": {"user": {"edge_owner_to_timeline_media": {
                "count": 2,
                "page_info": {"has_next_page": false, "end_cursor": null},
                "edges": [media_node("1", "IMG", false), media_node("2", "VID", true)]
            }}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/VID"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><meta property="og:video:secure_url" content="https://cdn.example/VID.mp4"></head></html>"#,
            "text/html; charset=utf-8",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let profile = ProfileInfo {
        id: "42".into(),
        username: "nasa".into(),
        media_count: 2,
        ..ProfileInfo::default()
    };
    let result = client(&server)
        .harvest_media(&profile, &HarvestRequest::default())
        .await;

    assert_eq!(result.status, HarvestStatus::Complete);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let mut media: Vec<_> = result
        .records
        .iter()
        .filter_map(|record| record.as_media())
        .collect();
    media.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(media.len(), 2);
    assert_eq!(media[0].kind, MediaKind::Image);
    assert_eq!(media[0].resolved_media_url, "https://cdn.example/IMG.jpg");
    assert_eq!(media[1].kind, MediaKind::Video);
    assert_eq!(media[1].resolved_media_url, "https://cdn.example/VID.mp4");
}

#[tokio::test]
async fn explore_starts_from_first_cursor_in_pages_of_fourteen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "df0dcc250c2b18d9fd27c5581ef33c7c"))
        .and(Variables(json!({"first": 14, "after": "1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": {"user": {"edge_web_discover_media": {
                "page_info": {"has_next_page": true, "end_cursor": "2"},
                "edges": [media_node("5", "EXP", false)]
            }}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // An empty cursor starts the feed from its first cursor.
    let request = HarvestRequest {
        start_cursor: String::new(),
        ..HarvestRequest::explore()
    };
    let result = client(&server).harvest_explore(&request).await;

    assert_eq!(result.status, HarvestStatus::Complete);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.count(), 1);
}

#[test]
fn explore_request_defaults() {
    let request = HarvestRequest::explore();
    assert_eq!(request.page_size, 14);
    assert_eq!(request.start_cursor, "1");
    assert_eq!(request.total_wanted, 0);
}

#[tokio::test]
async fn story_reel_is_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "45246d3fe16ccc6577e0bd297a5db1ab"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": {"reels_media": [{
                "latest_reel_media": 1_600_000_100,
                "expiring_at": 1_600_086_500,
                "seen": null,
                "user": {"username": "nasa"},
                "items": [{"id": "s1"}, {"id": "s2"}]
            }]}
        })))
        .mount(&server)
        .await;

    let profile = ProfileInfo {
        id: "42".into(),
        username: "nasa".into(),
        ..ProfileInfo::default()
    };
    let story = client(&server).fetch_story(&profile).await.unwrap();
    assert_eq!(story.username, "nasa");
    assert_eq!(story.count(), 2);
    assert_eq!(story.latest_reel_media, Some(1_600_000_100));
    assert_eq!(story.seen, None);
}

#[tokio::test]
async fn absent_story_reel_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "data": {"reels_media": []}})),
        )
        .mount(&server)
        .await;

    let profile = ProfileInfo {
        id: "42".into(),
        username: "nasa".into(),
        ..ProfileInfo::default()
    };
    let story = client(&server).fetch_story(&profile).await.unwrap();
    assert_eq!(story.username, "nasa");
    assert_eq!(story.count(), 0);
}

#[tokio::test]
async fn notification_feed_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts/activity/"))
        .and(query_param("__a", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"graphql": {"user": {
            "edge_follow_requests": {"edges": [{"node": {"id": "3"}}]},
            "activity_feed": {
                "timestamp": 1_600_000_000.5,
                "edge_web_activity_feed": {"count": 2, "edges": [{"node": {}}, {"node": {}}]}
            }
        }}})))
        .mount(&server)
        .await;

    let feed = client(&server).fetch_notifications().await.unwrap();
    assert_eq!(feed.follow_requests.len(), 1);
    assert_eq!(feed.notification_count, 2);
    assert_eq!(feed.timestamp, Some(1_600_000_000.5));
}

#[tokio::test]
async fn notification_shape_errors_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"graphql": {}})))
        .mount(&server)
        .await;

    let err = client(&server).fetch_notifications().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Malformed);
}

#[tokio::test]
async fn search_returns_raw_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/web/search/topsearch/"))
        .and(query_param("context", "blended"))
        .and(query_param("query", "mars rover"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"users": [], "hashtags": [{"name": "mars"}]})),
        )
        .mount(&server)
        .await;

    let value = client(&server).search("mars rover").await.unwrap();
    assert_eq!(value["hashtags"][0]["name"], "mars");
}
