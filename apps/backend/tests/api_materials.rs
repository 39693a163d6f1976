//! Material API tests.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::fixtures;
use common::{TestContext, TestOptions};

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_create_material_defaults_to_draft() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/materials")
        .json(&fixtures::create_material_request(
            "Scrum Guide notes",
            "text",
            json!(fixtures::SCRUM_NOTES),
        ))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["material"]["title"], "Scrum Guide notes");
    assert_eq!(body["material"]["type"], "text");
    assert_eq!(body["material"]["status"], "draft");
    assert_eq!(body["material"]["content"], fixtures::SCRUM_NOTES);
}

#[tokio::test]
async fn test_create_material_requires_title() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/materials")
        .json(&json!({ "title": "   ", "type": "text" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "bad_request");
    assert_eq!(body["error"], "title is required");

    let listed: Value = server.get("/api/materials").await.json();
    assert_eq!(listed["materials"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_material_rejects_unknown_type() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/materials")
        .json(&json!({ "title": "Video", "type": "video" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_body_is_json_error() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/materials")
        .text("{\"title\": ")
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_list_materials_filters() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    ctx.create_text_material("Notes A", fixtures::SCRUM_NOTES).await;
    let b = ctx.create_text_material("Notes B", fixtures::SCRUM_NOTES).await;
    server
        .post("/api/materials")
        .json(&json!({ "title": "Quiz shell", "type": "quiz" }))
        .await
        .assert_status_ok();
    server
        .patch(&format!("/api/materials/{}/status", b.id))
        .json(&json!({ "status": "published" }))
        .await
        .assert_status_ok();

    let all: Value = server.get("/api/materials").await.json();
    assert_eq!(all["materials"].as_array().unwrap().len(), 3);

    let texts: Value = server.get("/api/materials?type=text").await.json();
    assert_eq!(texts["materials"].as_array().unwrap().len(), 2);

    let published_texts: Value = server
        .get("/api/materials?type=text&status=published")
        .await
        .json();
    let published_texts = published_texts["materials"].as_array().unwrap();
    assert_eq!(published_texts.len(), 1);
    assert_eq!(published_texts[0]["id"], b.id);

    server
        .get("/api/materials?status=archived")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_published_listing_hides_drafts() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let draft = ctx.create_text_material("Draft", "x").await;
    let live = ctx.create_text_material("Live", "y").await;
    server
        .patch(&format!("/api/materials/{}/status", live.id))
        .json(&json!({ "status": "published" }))
        .await
        .assert_status_ok();

    let body: Value = server.get("/api/materials/published").await.json();
    let ids: Vec<i64> = body["materials"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![live.id]);
    assert!(!ids.contains(&draft.id));
}

#[tokio::test]
async fn test_status_change_is_idempotent() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let material = ctx.create_text_material("Notes", "x").await;
    let path = format!("/api/materials/{}/status", material.id);

    let first: Value = server
        .patch(&path)
        .json(&json!({ "status": "published" }))
        .await
        .json();
    assert_eq!(first["success"], true);
    assert_eq!(first["changed"], true);
    assert_eq!(first["material"]["status"], "published");

    let second = server.patch(&path).json(&json!({ "status": "published" })).await;
    second.assert_status_ok();
    let second: Value = second.json();
    assert_eq!(second["success"], true);
    assert_eq!(second["changed"], false);
    assert_eq!(second["message"], "Status unchanged");

    server
        .patch(&path)
        .json(&json!({ "status": "retired" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .patch("/api/materials/9999/status")
        .json(&json!({ "status": "published" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_material() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let material = ctx.create_text_material("Old title", "old text").await;

    let response = server
        .patch(&format!("/api/materials/{}", material.id))
        .json(&json!({ "title": "New title", "content": { "text": "new text" } }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["material"]["title"], "New title");
    assert_eq!(body["material"]["content"]["text"], "new text");

    server
        .patch("/api/materials/4242")
        .json(&json!({ "title": "x" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_material_not_found_and_bad_id() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let missing = server.get("/api/materials/77").await;
    missing.assert_status(StatusCode::NOT_FOUND);
    let body: Value = missing.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "not_found");

    server
        .get("/api/materials/not-a-number")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_material_removes_questions() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let created: Value = server
        .post("/api/materials")
        .json(&json!({ "title": "Manual quiz", "type": "quiz" }))
        .await
        .json();
    let quiz_id = created["material"]["id"].as_i64().unwrap();
    server
        .post(&format!("/api/materials/{quiz_id}/questions"))
        .json(&fixtures::question_request("Is Scrum a framework?", "true_false", "true", &[]))
        .await
        .assert_status_ok();

    let response = server.delete(&format!("/api/materials/{quiz_id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["file_removed"], false);

    assert!(ctx.db.list_questions(quiz_id).await.unwrap().is_empty());
    server
        .get(&format!("/api/materials/{quiz_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/materials/{quiz_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_material_with_missing_file_still_deletes_row() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let created: Value = server
        .post("/api/materials")
        .json(&json!({ "title": "Lost PDF", "type": "pdf", "file_path": "uploads/gone.pdf" }))
        .await
        .json();
    let id = created["material"]["id"].as_i64().unwrap();

    let response = server.delete(&format!("/api/materials/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["file_removed"], false);
    assert!(ctx.db.get_material(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_routes_require_token_when_configured() {
    let ctx = TestContext::with_options(TestOptions {
        admin_token: Some("s3cret".to_string()),
        ..Default::default()
    })
    .await;
    let server = TestServer::new(ctx.router()).unwrap();
    let request = json!({ "title": "Guarded", "type": "text" });

    let missing = server.post("/api/materials").json(&request).await;
    missing.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = missing.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "unauthorized");

    server
        .post("/api/materials")
        .add_header(AUTHORIZATION, TestContext::auth_header_value("wrong"))
        .json(&request)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/materials")
        .add_header(AUTHORIZATION, TestContext::auth_header_value("s3cret"))
        .json(&request)
        .await
        .assert_status_ok();

    // Public routes stay open
    server.get("/api/materials/published").await.assert_status_ok();
    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_file_path_must_stay_inside_public_dir() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/materials")
        .json(&json!({ "title": "Escape", "type": "pdf", "file_path": "../../etc/passwd" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "bad_request");
    let listed: Value = server.get("/api/materials").await.json();
    assert!(listed["materials"].as_array().unwrap().is_empty());

    let created: Value = server
        .post("/api/materials")
        .json(&json!({ "title": "Guide", "type": "pdf", "file_path": "/public/uploads/guide.pdf" }))
        .await
        .json();
    assert_eq!(created["material"]["file_path"], "uploads/guide.pdf");
    let id = created["material"]["id"].as_i64().unwrap();

    server
        .patch(&format!("/api/materials/{id}"))
        .json(&json!({ "file_path": "uploads/../../secret" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let stored = ctx.db.get_material(id).await.unwrap().unwrap();
    assert_eq!(stored.file_path.as_deref(), Some("uploads/guide.pdf"));
}
