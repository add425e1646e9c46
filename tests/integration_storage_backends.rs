#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::print_stderr, clippy::similar_names)]
use msgdrop_server::config::Config;
use reqwest::StatusCode;
mod common;

/// Runs the public scenario against whichever backend `config` selects.
async fn run_scenario(config: Config) {
    let app = common::TestApp::spawn_with_config(config).await;

    let hello: serde_json::Value = app.post_message("hello").await.json().await.unwrap();
    let world: serde_json::Value = app.post_message("world").await.json().await.unwrap();
    assert_eq!(hello["message"]["id"], 1);
    assert_eq!(world["message"]["id"], 2);

    let listed = app.list_messages("").await;
    assert_eq!(listed["messages"][0]["content"], "world");
    assert_eq!(listed["messages"][1]["content"], "hello");
    assert_eq!(app.count().await, 2);

    let resp = app.client.delete(format!("{}/api/messages/1", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.client.delete(format!("{}/api/messages/1", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.count().await, 1);

    let resp = app.client.delete(format!("{}/api/messages?confirm=true", app.server_url)).send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], 1);
    assert_eq!(app.count().await, 0);

    let next: serde_json::Value = app.post_message("after clear").await.json().await.unwrap();
    assert_eq!(next["message"]["id"], 3);
}

#[tokio::test]
async fn test_file_backend_scenario() {
    let dir = common::temp_messages_dir();
    run_scenario(common::config_from_args(&["--storage-backend", "file", "--messages-dir", dir.to_str().unwrap()]))
        .await;
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_file_backend_writes_one_file_per_message() {
    let dir = common::temp_messages_dir();
    let config = common::config_from_args(&["--storage-backend", "file", "--messages-dir", dir.to_str().unwrap()]);
    let app = common::TestApp::spawn_with_config(config).await;

    for content in ["one", "two", "three"] {
        assert_eq!(app.post_message(content).await.status(), StatusCode::OK);
    }

    let record_files = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count();
    assert_eq!(record_files, 3);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_sqlite_backend_scenario() {
    let path = std::env::temp_dir().join(format!("msgdrop-test-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    run_scenario(common::config_from_args(&["--storage-backend", "sqlite", "--database-url", url.as_str()])).await;

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

#[tokio::test]
async fn test_sqlite_in_memory_backend_scenario() {
    run_scenario(common::config_from_args(&["--storage-backend", "sqlite", "--database-url", "sqlite::memory:"])).await;
}

#[tokio::test]
async fn test_memory_backend_scenario() {
    run_scenario(common::get_test_config()).await;
}

/// Needs a disposable database; the `messages` table is wiped.
#[tokio::test]
async fn test_postgres_backend_scenario() {
    let Ok(url) = std::env::var("MSGDROP_TEST_DATABASE_URL") else {
        eprintln!("MSGDROP_TEST_DATABASE_URL not set, skipping postgres scenario");
        return;
    };

    let config = common::config_from_args(&[
        "--storage-backend",
        "postgres",
        "--database-url",
        url.as_str(),
        "--reset-sequence-on-clear",
    ]);

    // Start from a clean table with the sequence at 1.
    let storage = msgdrop_server::storage::open(&config.storage).await.unwrap();
    storage.delete_all(true).await.unwrap();

    let app = common::TestApp::spawn_with_storage(config, storage).await;

    let hello: serde_json::Value = app.post_message("hello").await.json().await.unwrap();
    assert_eq!(hello["message"]["id"], 1);
    let world: serde_json::Value = app.post_message("world").await.json().await.unwrap();
    assert_eq!(world["message"]["id"], 2);

    let listed = app.list_messages("").await;
    assert_eq!(listed["messages"][0]["id"], 2);
    assert_eq!(app.count().await, 2);

    let resp = app.client.delete(format!("{}/api/messages/1", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.count().await, 1);

    let resp = app.client.delete(format!("{}/api/messages?confirm=true", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let fresh: serde_json::Value = app.post_message("fresh").await.json().await.unwrap();
    assert_eq!(fresh["message"]["id"], 1);
}
