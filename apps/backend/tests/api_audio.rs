//! Audio lecture API tests.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use common::fixtures;
use common::{StubLlm, StubTts, TestContext, TestOptions};

const FAKE_MP3: &[u8] = b"ID3\x04\x00fake-mp3-frames";

async fn audio_context(llm: std::sync::Arc<StubLlm>, tts: std::sync::Arc<StubTts>) -> TestContext {
    TestContext::with_options(TestOptions {
        llm: Some(llm),
        tts: Some(tts),
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn test_generate_audio_lecture() {
    let tts = StubTts::returning(FAKE_MP3);
    let ctx = audio_context(StubLlm::replying(fixtures::LECTURE_SCRIPT), tts.clone()).await;
    let server = TestServer::new(ctx.router()).unwrap();
    let source = ctx.create_text_material("Scrum Guide", fixtures::SCRUM_NOTES).await;

    let response = server
        .post("/api/audio/generate")
        .json(&json!({ "material_id": source.id }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let material = &body["material"];
    assert_eq!(body["success"], true);
    assert_eq!(material["type"], "audio");
    assert_eq!(material["status"], "draft");
    assert_eq!(material["title"], "Lecture: Scrum Guide");
    assert_eq!(material["content"]["script"], fixtures::LECTURE_SCRIPT);
    assert_eq!(tts.calls(), 1);

    let file_path = material["file_path"].as_str().unwrap();
    assert!(file_path.starts_with("audio/") && file_path.ends_with(".mp3"));
    let script_path = material["content"]["script_path"].as_str().unwrap();
    assert!(script_path.ends_with(".json"));
    assert_eq!(ctx.count_files("audio"), 2);

    // The file is served from the public directory
    let served = server.get(material["file_url"].as_str().unwrap()).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), FAKE_MP3);

    let script: Value = serde_json::from_slice(&ctx.storage.read_file(script_path).await.unwrap()).unwrap();
    assert_eq!(script["script"], fixtures::LECTURE_SCRIPT);
    assert_eq!(script["source_material_id"], source.id);

    let listed: Value = server.get("/api/audio").await.json();
    assert_eq!(listed["materials"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tts_failure_writes_nothing() {
    let ctx = audio_context(
        StubLlm::replying(fixtures::LECTURE_SCRIPT),
        StubTts::failing(400, "input too long"),
    )
    .await;
    let server = TestServer::new(ctx.router()).unwrap();
    let source = ctx.create_text_material("Scrum Guide", fixtures::SCRUM_NOTES).await;

    let response = server
        .post("/api/audio/generate")
        .json(&json!({ "material_id": source.id }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("input too long"));
    assert_eq!(ctx.count_files("audio"), 0);

    let listed: Value = server.get("/api/audio").await.json();
    assert!(listed["materials"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_audio_without_tts_configured() {
    let llm = StubLlm::replying(fixtures::LECTURE_SCRIPT);
    let ctx = TestContext::with_llm(llm.clone()).await;
    let server = TestServer::new(ctx.router()).unwrap();
    let source = ctx.create_text_material("Scrum Guide", fixtures::SCRUM_NOTES).await;

    let response = server
        .post("/api/audio/generate")
        .json(&json!({ "material_id": source.id }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_delete_audio_removes_files() {
    let ctx = audio_context(
        StubLlm::replying(fixtures::LECTURE_SCRIPT),
        StubTts::returning(FAKE_MP3),
    )
    .await;
    let server = TestServer::new(ctx.router()).unwrap();
    let source = ctx.create_text_material("Scrum Guide", fixtures::SCRUM_NOTES).await;

    let created: Value = server
        .post("/api/audio/generate")
        .json(&json!({ "material_id": source.id, "title": "Accountabilities" }))
        .await
        .json();
    assert_eq!(created["material"]["title"], "Accountabilities");
    let id = created["material"]["id"].as_i64().unwrap();

    let response = server.delete(&format!("/api/audio/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["file_removed"], true);
    assert_eq!(ctx.count_files("audio"), 0);

    server
        .delete(&format!("/api/audio/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_audio_survives_missing_file() {
    let ctx = audio_context(
        StubLlm::replying(fixtures::LECTURE_SCRIPT),
        StubTts::returning(FAKE_MP3),
    )
    .await;
    let server = TestServer::new(ctx.router()).unwrap();
    let source = ctx.create_text_material("Scrum Guide", fixtures::SCRUM_NOTES).await;

    let created: Value = server
        .post("/api/audio/generate")
        .json(&json!({ "material_id": source.id }))
        .await
        .json();
    let id = created["material"]["id"].as_i64().unwrap();
    ctx.storage
        .delete_file(created["material"]["file_path"].as_str().unwrap())
        .await
        .unwrap();

    let response = server.delete(&format!("/api/audio/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["file_removed"], false);
    assert!(ctx.db.get_material(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_audio_rejects_other_types() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let text = ctx.create_text_material("Notes", "x").await;

    server
        .delete(&format!("/api/audio/{}", text.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(ctx.db.get_material(text.id).await.unwrap().is_some());
}
