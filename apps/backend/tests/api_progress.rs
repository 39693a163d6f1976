//! Progress API tests.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use common::fixtures;
use common::TestContext;

#[tokio::test]
async fn test_progress_upsert_keeps_one_row() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let first = server
        .post("/api/progress")
        .json(&fixtures::progress_request("learner-1", "12", 40.0))
        .await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["success"], true);
    assert_eq!(first["progress"]["progress_percent"], 40.0);
    assert_eq!(first["progress"]["completed"], false);

    let second: Value = server
        .post("/api/progress")
        .json(&json!({ "user_id": "learner-1", "content_id": "12", "completed": true, "score": 85.0 }))
        .await
        .json();
    assert_eq!(second["progress"]["id"], first["progress"]["id"]);
    assert_eq!(second["progress"]["completed"], true);
    assert_eq!(second["progress"]["progress_percent"], 100.0);
    assert_eq!(second["progress"]["score"], 85.0);

    let listed: Value = server.get("/api/progress?user_id=learner-1").await.json();
    assert_eq!(listed["progress"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_progress_validation() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    server
        .post("/api/progress")
        .json(&json!({ "content_id": "1" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/progress")
        .json(&fixtures::progress_request("learner-1", "1", 140.0))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/progress")
        .json(&json!({ "user_id": "u", "content_id": "1", "time_spent_seconds": -5 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/progress")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_progress_summary() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    for (content, completed, score, seconds) in [("1", true, 90.0, 300), ("2", true, 70.0, 200), ("3", false, 0.0, 60)] {
        let mut request = json!({
            "user_id": "learner-2",
            "content_id": content,
            "completed": completed,
            "time_spent_seconds": seconds,
        });
        if completed {
            request["score"] = json!(score);
        }
        server.post("/api/progress").json(&request).await.assert_status_ok();
    }
    server
        .post("/api/progress")
        .json(&fixtures::progress_request("someone-else", "1", 10.0))
        .await
        .assert_status_ok();

    let body: Value = server.get("/api/progress/summary?user_id=learner-2").await.json();
    let summary = &body["summary"];
    assert_eq!(summary["user_id"], "learner-2");
    assert_eq!(summary["total_items"], 3);
    assert_eq!(summary["completed_items"], 2);
    assert_eq!(summary["average_score"], 80.0);
    assert_eq!(summary["total_time_spent_seconds"], 560);

    let empty: Value = server.get("/api/progress/summary?user_id=nobody").await.json();
    assert_eq!(empty["summary"]["total_items"], 0);
    assert!(empty["summary"]["average_score"].is_null());
}
