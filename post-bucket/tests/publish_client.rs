use std::time::Duration;

use post_bucket::credentials::ApiKey;
use post_bucket::publish::{ArticleClient, API_KEY_HEADER, PAGE_SIZE};
use post_bucket_core::contract::{ApiError, ArticleApi, ArticlePayload};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

fn client(server: &MockServer) -> ArticleClient {
    ArticleClient::new(server.uri(), ApiKey::new(KEY), Duration::from_secs(5)).unwrap()
}

fn payload() -> ArticlePayload {
    ArticlePayload {
        title: "Hello World".to_owned(),
        body_markdown: "Body text".to_owned(),
        published: true,
        series: None,
        canonical_url: "https://blog.example/posts/hello-world".to_owned(),
        description: Some("Intro".to_owned()),
        tags: Some(json!(["rust", "cli"])),
    }
}

#[tokio::test]
async fn test_create_posts_wrapped_payload_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/articles"))
        .and(header(API_KEY_HEADER, KEY))
        .and(body_json(json!({
            "article": {
                "title": "Hello World",
                "body_markdown": "Body text",
                "published": true,
                "canonical_url": "https://blog.example/posts/hello-world",
                "description": "Intro",
                "tags": ["rust", "cli"]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1001,
            "title": "Hello World",
            "url": "https://dev.to/me/hello-world",
            "canonical_url": "https://blog.example/posts/hello-world",
            "published": true,
            "tag_list": "rust, cli"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server).create_article(&payload()).await.unwrap();

    assert_eq!(created.id, 1001);
    assert_eq!(created.title, "Hello World");
    assert!(created.published);
}

#[tokio::test]
async fn test_create_duplicate_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/articles"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string(r#"{"error":"Title has already been used"}"#),
        )
        .mount(&server)
        .await;

    let err = client(&server).create_article(&payload()).await.unwrap_err();

    assert!(matches!(err, ApiError::Conflict { ref body } if body.contains("already been used")));
}

#[tokio::test]
async fn test_create_server_error_is_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client(&server).create_article(&payload()).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Status {
            status: 500,
            body: "boom".to_owned()
        }
    );
}

#[tokio::test]
async fn test_update_puts_to_article_id() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/articles/4242"))
        .and(header(API_KEY_HEADER, KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242,
            "title": "Hello World",
            "published": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client(&server).update_article(4242, &payload()).await.unwrap();

    assert_eq!(updated.id, 4242);
    assert_eq!(updated.url, None);
}

#[tokio::test]
async fn test_update_rejects_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/articles/7"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client(&server).update_article(7, &payload()).await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_list_published_reads_until_short_page() {
    let server = MockServer::start().await;
    let full_page: Vec<_> = (1..=PAGE_SIZE as u64)
        .map(|id| json!({"id": id, "title": format!("Post {id}"), "published": true}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/articles/me/published"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", PAGE_SIZE.to_string()))
        .and(header(API_KEY_HEADER, KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles/me/published"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 9001, "title": "Last one", "published": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let articles = client(&server).list_published().await.unwrap();

    assert_eq!(articles.len(), PAGE_SIZE + 1);
    assert_eq!(articles.last().unwrap().id, 9001);
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/articles"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 1, "title": "Hello World"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client =
        ArticleClient::new(server.uri(), ApiKey::new(KEY), Duration::from_millis(200)).unwrap();
    let err = client.create_article(&payload()).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    // Nothing listens on the discard port.
    let client = ArticleClient::new(
        "http://127.0.0.1:9",
        ApiKey::new(KEY),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = client.list_published().await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn test_list_published_stops_when_server_ignores_page() {
    let server = MockServer::start().await;
    let full_page: Vec<_> = (1..=PAGE_SIZE as u64)
        .map(|id| json!({"id": id, "title": format!("Post {id}"), "published": true}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/articles/me/published"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_page))
        .expect(2)
        .mount(&server)
        .await;

    let articles = client(&server).list_published().await.unwrap();

    assert_eq!(articles.len(), PAGE_SIZE);
    assert_eq!(articles.last().unwrap().id, PAGE_SIZE as u64);
}
