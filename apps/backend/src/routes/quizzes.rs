//! Quiz endpoints: generation, taking and grading

use axum::{extract::State, Json};
use sensei_core::{grade_quiz, AnswerKey};

use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::models::*;
use crate::routes::materials::find_material;
use crate::routes::required;
use crate::services::generation::{self, DEFAULT_QUESTION_COUNT};
use crate::AppState;

/// POST /api/quizzes/generate
pub async fn generate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateQuizRequest>,
) -> Result<Json<ApiResponse<GeneratedQuizResponse>>> {
    let material_id = request
        .material_id
        .ok_or_else(|| ApiError::BadRequest("material_id is required".to_string()))?;
    let question_count = request.question_count.unwrap_or(DEFAULT_QUESTION_COUNT);

    let generated =
        generation::generate_quiz(&state, material_id, question_count, request.title).await?;

    Ok(Json(ApiResponse::ok(GeneratedQuizResponse {
        material: generated.material.to_api(),
        questions: generated.questions.iter().map(DbQuestion::to_api).collect(),
        repair_stage: generated.repair_stage,
        rejected: generated.rejected,
    })))
}

/// GET /api/quizzes/:id
///
/// Questions are returned without answers or explanations.
pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<QuizView>>> {
    let material = find_quiz(&state, id).await?;
    let questions = state.db.list_questions(id).await?;

    Ok(Json(ApiResponse::ok(QuizView {
        material: material.to_api(),
        questions: questions.iter().map(DbQuestion::to_quiz_item).collect(),
    })))
}

/// POST /api/quizzes/:id/submit
///
/// Grades the answers and records the attempt in the user's progress.
pub async fn submit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<SubmitQuizRequest>,
) -> Result<Json<ApiResponse<SubmitQuizResponse>>> {
    let user_id = required(request.user_id, "user_id")?;
    let time_spent = request.time_spent_seconds.unwrap_or(0);
    if time_spent < 0 {
        return Err(ApiError::BadRequest(
            "time_spent_seconds must not be negative".to_string(),
        ));
    }

    find_quiz(&state, id).await?;
    let questions = state.db.list_questions(id).await?;
    if questions.is_empty() {
        return Err(ApiError::BadRequest(format!("Quiz {id} has no questions")));
    }

    let keys: Vec<AnswerKey> = questions
        .iter()
        .map(|q| AnswerKey {
            question_id: q.id,
            question_type: q.kind(),
            correct_answer: q.correct_answer.clone(),
            explanation: q.explanation.clone(),
        })
        .collect();
    let grade = grade_quiz(&keys, &request.answers);

    let content_id = id.to_string();
    let mut progress = state
        .db
        .get_progress(&user_id, &content_id)
        .await?
        .unwrap_or_else(|| DbProgress::new_for(&user_id, &content_id));
    progress.completed = true;
    progress.progress_percent = 100.0;
    progress.score = Some(grade.score);
    progress.attempts += 1;
    progress.time_spent_seconds += time_spent;
    let progress = state.db.upsert_progress(&progress).await?;

    tracing::info!(
        quiz_id = id,
        user_id = %user_id,
        score = grade.score,
        attempts = progress.attempts,
        "Quiz submitted"
    );

    Ok(Json(ApiResponse::ok(SubmitQuizResponse { grade, progress })))
}

/// GET /api/quizzes
pub async fn list_legacy(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<LegacyQuizListResponse>>> {
    let quizzes = state.db.list_legacy_quizzes().await?;
    Ok(Json(ApiResponse::ok(LegacyQuizListResponse { quizzes })))
}

/// POST /api/quizzes
pub async fn create_legacy(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateLegacyQuizRequest>,
) -> Result<Json<ApiResponse<LegacyQuizResponse>>> {
    let title = required(request.title, "title")?;
    let quiz = state.db.create_legacy_quiz(&title).await?;
    Ok(Json(ApiResponse::ok(LegacyQuizResponse { quiz })))
}

async fn find_quiz(state: &AppState, id: i64) -> Result<DbMaterial> {
    let material = find_material(state, id).await?;
    if material.kind() != MaterialType::Quiz {
        return Err(ApiError::NotFound(format!("Quiz {id} not found")));
    }
    Ok(material)
}
