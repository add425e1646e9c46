#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use reqwest::StatusCode;
use serde_json::json;
mod common;

#[tokio::test]
async fn test_hello_world_flow() {
    let app = common::TestApp::spawn().await;

    let resp = app.post_message("hello").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"]["id"], 1);
    assert_eq!(body["message"]["content"], "hello");
    assert_eq!(body["length"], 5);
    assert!(body["message"]["createdAt"].is_string());

    let body: serde_json::Value = app.post_message("world").await.json().await.unwrap();
    assert_eq!(body["message"]["id"], 2);
    assert_eq!(body["message"]["content"], "world");

    let listed = app.list_messages("").await;
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["messages"][0]["id"], 2);
    assert_eq!(listed["messages"][1]["id"], 1);

    assert_eq!(app.count().await, 2);

    let resp = app.client.delete(format!("{}/api/messages/1", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "id": 1 }));

    assert_eq!(app.count().await, 1);
}

#[tokio::test]
async fn test_list_returns_newest_first() {
    let app = common::TestApp::spawn().await;

    for content in ["A", "B", "C"] {
        assert_eq!(app.post_message(content).await.status(), StatusCode::OK);
    }

    let listed = app.list_messages("").await;
    let contents: Vec<&str> =
        listed["messages"].as_array().unwrap().iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["C", "B", "A"]);
}

#[tokio::test]
async fn test_list_respects_limit_and_cap() {
    let config = common::config_from_args(&["--storage-backend", "memory", "--list-max-limit", "4"]);
    let app = common::TestApp::spawn_with_config(config).await;

    for i in 0..6 {
        app.post_message(&format!("message {i}")).await;
    }

    assert_eq!(app.list_messages("?limit=2").await["count"], 2);
    assert_eq!(app.list_messages("?limit=50").await["count"], 4);
    assert_eq!(app.list_messages("").await["count"], 4);
    assert_eq!(app.count().await, 6);
}

#[tokio::test]
async fn test_empty_store_lists_nothing() {
    let app = common::TestApp::spawn().await;

    let listed = app.list_messages("").await;
    assert_eq!(listed, json!({ "messages": [], "count": 0 }));
    assert_eq!(app.count().await, 0);
}

#[tokio::test]
async fn test_content_is_trimmed_before_storing() {
    let app = common::TestApp::spawn().await;

    let body: serde_json::Value = app.post_message("   spaced out \n").await.json().await.unwrap();
    assert_eq!(body["message"]["content"], "spaced out");
    assert_eq!(body["length"], 10);
}

#[tokio::test]
async fn test_content_alias_is_accepted() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/api/messages", app.server_url))
        .json(&json!({ "content": "via alias" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_submissions_create_duplicate_records() {
    let app = common::TestApp::spawn().await;

    let first: serde_json::Value = app.post_message("same").await.json().await.unwrap();
    let second: serde_json::Value = app.post_message("same").await.json().await.unwrap();
    assert_ne!(first["message"]["id"], second["message"]["id"]);
    assert_eq!(app.count().await, 2);
}

#[tokio::test]
async fn test_delete_all_with_confirmation() {
    let app = common::TestApp::spawn().await;
    for content in ["a", "b", "c"] {
        app.post_message(content).await;
    }

    let resp = app.client.delete(format!("{}/api/messages?confirm=true", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": true, "deleted": 3 }));
    assert_eq!(app.count().await, 0);

    // Ids keep counting unless a reset was configured.
    let body: serde_json::Value = app.post_message("d").await.json().await.unwrap();
    assert_eq!(body["message"]["id"], 4);
}

#[tokio::test]
async fn test_delete_all_resets_sequence_when_configured() {
    let config = common::config_from_args(&["--storage-backend", "memory", "--reset-sequence-on-clear"]);
    let app = common::TestApp::spawn_with_config(config).await;
    app.post_message("a").await;
    app.post_message("b").await;

    let resp = app.client.delete(format!("{}/api/messages?confirm=true", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = app.post_message("fresh").await.json().await.unwrap();
    assert_eq!(body["message"]["id"], 1);
}

#[tokio::test]
async fn test_origin_and_user_agent_are_recorded() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/api/messages", app.server_url))
        .header("user-agent", "integration-test/1.0")
        .header("x-forwarded-for", "198.51.100.23")
        .json(&json!({ "message": "tracked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Loopback is a trusted proxy by default, so the forwarded address wins.
    let stored = app.storage.query_all(Some(1)).await.unwrap();
    assert_eq!(stored[0].origin.as_deref(), Some("198.51.100.23"));
    assert_eq!(stored[0].user_agent.as_deref(), Some("integration-test/1.0"));

    // Metadata is not part of the public response.
    let listed = app.list_messages("").await;
    assert!(listed["messages"][0].get("origin").is_none());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .get(format!("{}/api/messages", app.server_url))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "trace-me-123");

    let resp = app.client.get(format!("{}/api/messages/count", app.server_url)).send().await.unwrap();
    assert!(resp.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .get(format!("{}/api/messages", app.server_url))
        .header("origin", "https://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/api/health", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}
