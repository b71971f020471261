//! Integration tests for the HTTP collaborators and the published dashboard state.

use std::time::Duration;

use drillnorm::config::Config;
use drillnorm::fetch::{
    http_client, Dashboard, HttpMediaResolver, HttpPostSource, MediaResolver, PostSource,
    SessionContext,
};
use drillnorm::FetchError;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POSTS_PATH: &str = "/wp-json/wp/v2/posts";

fn test_config(server: &MockServer, per_page: u32) -> Config {
    Config {
        api_base: format!("{}/wp-json", server.uri()),
        per_page,
        max_pages: 5,
        timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

fn post(id: i64) -> Value {
    json!({
        "id": id,
        "date": "2025-09-01T10:00:00",
        "title": {"rendered": format!("訓練 {id}")},
        "content": {"rendered": "<p>報告</p>"},
        "featured_media": id * 10,
        "acf": {
            "participants_count": format!("{}人", id * 10),
            "drill_types": "シェイクアウト, 炊き出し",
            "lat": "34.69",
            "lng": "135.19"
        }
    })
}

async fn mount_page(server: &MockServer, page: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn follows_pages_until_short_page() {
    let server = MockServer::start().await;
    mount_page(&server, "1", json!([post(1), post(2)])).await;
    mount_page(&server, "2", json!([post(3)])).await;

    let config = test_config(&server, 2);
    let source = HttpPostSource::new(http_client(&config).unwrap(), &config);
    let posts = source.fetch_posts(&SessionContext::anonymous()).await.unwrap();

    assert_eq!(posts.len(), 3);
    assert_eq!(posts[2].get("id"), Some(&json!(3)));
}

#[tokio::test]
async fn stops_at_total_pages_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-WP-TotalPages", "1")
                .set_body_json(json!([post(1), post(2)])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([post(9)])))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(&server, 2);
    let source = HttpPostSource::new(http_client(&config).unwrap(), &config);
    let posts = source.fetch_posts(&SessionContext::anonymous()).await.unwrap();
    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn out_of_range_page_ends_collection() {
    let server = MockServer::start().await;
    mount_page(&server, "1", json!([post(1), post(2)])).await;
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": "rest_post_invalid_page_number"})))
        .mount(&server)
        .await;

    let config = test_config(&server, 2);
    let source = HttpPostSource::new(http_client(&config).unwrap(), &config);
    let posts = source.fetch_posts(&SessionContext::anonymous()).await.unwrap();
    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn attaches_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([post(1)])))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server, 10);
    let source = HttpPostSource::new(http_client(&config).unwrap(), &config);
    let posts = source
        .fetch_posts(&SessionContext::with_token("secret-token"))
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
}

#[tokio::test]
async fn non_array_body_is_empty_result() {
    let server = MockServer::start().await;
    mount_page(&server, "1", json!({"message": "maintenance"})).await;

    let config = test_config(&server, 10);
    let dashboard = Dashboard::new(
        HttpPostSource::new(http_client(&config).unwrap(), &config),
        SessionContext::anonymous(),
    );
    dashboard.refetch().await;

    let state = dashboard.state();
    assert!(state.error().is_none());
    assert!(state.used_fallback);
    assert!(!state.reports().is_empty());
}

#[tokio::test]
async fn server_error_publishes_fallback_with_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(&server, 10);
    let dashboard = Dashboard::new(
        HttpPostSource::new(http_client(&config).unwrap(), &config),
        SessionContext::anonymous(),
    );
    dashboard.refetch().await;

    let state = dashboard.state();
    assert!(!state.is_loading);
    assert!(matches!(state.error(), Some(FetchError::Status { status: 500, .. })));
    assert!(!state.reports().is_empty());
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POSTS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([post(1)]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = Config {
        timeout: Duration::from_millis(200),
        ..test_config(&server, 10)
    };
    let source = HttpPostSource::new(http_client(&config).unwrap(), &config);
    let err = source
        .fetch_posts(&SessionContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }));
}

#[tokio::test]
async fn live_posts_flow_through_pipeline() {
    let server = MockServer::start().await;
    mount_page(&server, "1", json!([post(1), post(2)])).await;
    for id in [10, 20] {
        Mock::given(method("GET"))
            .and(path(format!("/wp-json/wp/v2/media/{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": id, "source_url": format!("https://cdn.example/{id}.jpg")})),
            )
            .mount(&server)
            .await;
    }

    let config = test_config(&server, 10);
    let client = http_client(&config).unwrap();
    let dashboard = Dashboard::new(
        HttpPostSource::new(client.clone(), &config),
        SessionContext::anonymous(),
    );
    dashboard.refetch().await;

    let state = dashboard.state();
    assert!(state.error().is_none());
    assert!(!state.used_fallback);
    assert_eq!(state.total_drills(), 2);
    assert_eq!(state.total_participants(), 30);
    let chart = state.chart_data();
    assert_eq!(chart.len(), 2);
    assert_eq!((chart[0].name.as_str(), chart[0].value), ("シェイクアウト", 2));
    assert!(state.reports().iter().all(|r| r.location.is_some()));

    let resolver = HttpMediaResolver::new(client, &config);
    assert_eq!(dashboard.resolve_thumbnails(&resolver).await, 2);
    assert_eq!(
        dashboard.thumbnails().get(20).as_deref(),
        Some("https://cdn.example/20.jpg")
    );
}

#[tokio::test]
async fn media_without_source_url_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/media/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "source_url": ""})))
        .mount(&server)
        .await;

    let config = test_config(&server, 10);
    let resolver = HttpMediaResolver::new(http_client(&config).unwrap(), &config);
    let err = resolver
        .resolve(7, &SessionContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MissingSource { id: 7 }));
}
