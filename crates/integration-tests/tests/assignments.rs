mod harness;

use harness::config::ConfigBuilder;
use harness::server::TestServer;
use jiff::Timestamp;
use serde_json::Value;

#[tokio::test]
async fn assignment_sticks_across_calls() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let first = server.bucket(1, "E1 - new next button", &["control", "test 1"]).await;
    assert!(first == "control" || first == "test 1");

    for _ in 0..5 {
        assert_eq!(server.bucket(1, "E1 - new next button", &["control", "test 1"]).await, first);
    }

    // Changing the candidates later does not move the user
    assert_eq!(server.bucket(1, "E1 - new next button", &["x", "y"]).await, first);
}

#[tokio::test]
async fn assignment_survives_without_cache() {
    let server = TestServer::start(ConfigBuilder::new().without_cache().build()).await.unwrap();

    let first = server.bucket(7, "E1", &["a", "b", "c"]).await;
    for _ in 0..5 {
        assert_eq!(server.bucket(7, "E1", &["a", "b", "c"]).await, first);
    }
}

#[tokio::test]
async fn anonymous_user_is_rejected() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server.assign(None, "E1", &["a", "b"]).await;
    assert_eq!(resp.status(), 401);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "unauthenticated_error");

    // Nothing was recorded, not even the experiment
    let listing: Value = server.staff_get("/experiments").await.json().await.unwrap();
    assert_eq!(listing["active_count"], 0);
}

#[tokio::test]
async fn bad_candidate_lists_are_rejected() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server.assign(Some(1), "E1", &[]).await;
    assert_eq!(resp.status(), 400);

    let resp = server.assign(Some(1), "E1", &["a", "All"]).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("reserved"));
}

#[tokio::test]
async fn malformed_body_is_a_json_error() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/assignments"))
        .bearer_auth(harness::config::SERVICE_TOKEN)
        .header("content-type", "application/json")
        .body("{\"experiment\": 5}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn users_are_mirrored() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();
    let joined: Timestamp = "2024-03-01T12:00:00Z".parse().unwrap();

    let resp = server
        .save_user(3, serde_json::json!({ "username": "carol", "date_joined": joined.to_string() }))
        .await;
    assert_eq!(resp.status(), 200);
    let user: Value = resp.json().await.unwrap();
    assert_eq!(user["id"], 3);
    assert_eq!(user["username"], "carol");

    // Renaming without a join date keeps the stored one
    let resp = server.save_user(3, serde_json::json!({ "username": "caroline" })).await;
    let user: Value = resp.json().await.unwrap();
    assert_eq!(user["username"], "caroline");
    let stored: Timestamp = user["date_joined"].as_str().unwrap().parse().unwrap();
    assert_eq!(stored, joined);

    let resp = server.save_user(4, serde_json::json!({ "username": " " })).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn sqlite_store_keeps_assignments_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("cadabra.db").display());

    let first = {
        let server = TestServer::start(ConfigBuilder::new().with_sqlite(&url).build()).await.unwrap();
        server.bucket(11, "E1", &["a", "b", "c", "d"]).await
    };

    let server = TestServer::start(ConfigBuilder::new().with_sqlite(&url).build()).await.unwrap();
    assert_eq!(server.bucket(11, "E1", &["e", "f"]).await, first);
}
