//! Question endpoints

use axum::{extract::State, Json};

use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::models::*;
use crate::routes::materials::find_material;
use crate::routes::{optional, parse_enum, required};
use crate::AppState;

/// GET /api/materials/:id/questions
pub async fn list(
    State(state): State<AppState>,
    ApiPath(material_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<QuestionListResponse>>> {
    find_material(&state, material_id).await?;
    let questions = state.db.list_questions(material_id).await?;

    Ok(Json(ApiResponse::ok(QuestionListResponse {
        material_id,
        questions: questions.iter().map(DbQuestion::to_api).collect(),
    })))
}

/// POST /api/materials/:id/questions
pub async fn create(
    State(state): State<AppState>,
    ApiPath(material_id): ApiPath<i64>,
    ApiJson(request): ApiJson<QuestionRequest>,
) -> Result<Json<ApiResponse<QuestionResponse>>> {
    let material = find_material(&state, material_id).await?;
    if material.kind() != MaterialType::Quiz {
        return Err(ApiError::BadRequest(format!(
            "Questions can only be added to quiz materials; material {material_id} is {}",
            material.kind().as_str()
        )));
    }

    let question = validate_question(request)?;
    let stored = state.db.insert_question(material_id, &question).await?;

    Ok(Json(ApiResponse::ok(QuestionResponse {
        question: stored.to_api(),
    })))
}

/// PUT /api/questions/:id
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<QuestionRequest>,
) -> Result<Json<ApiResponse<QuestionResponse>>> {
    let current = state
        .db
        .get_question(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    // Fields left out keep their stored value
    let merged = QuestionRequest {
        question: request.question.or(Some(current.question.clone())),
        question_type: request
            .question_type
            .or_else(|| Some(current.question_type.clone())),
        correct_answer: request.correct_answer.or(Some(current.correct_answer.clone())),
        options: request.options.or_else(|| Some(current.to_api().options)),
        explanation: request.explanation.or(current.explanation.clone()),
    };

    let question = validate_question(merged)?;
    let updated = state
        .db
        .update_question(id, &question)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(ApiResponse::ok(QuestionResponse {
        question: updated.to_api(),
    })))
}

/// DELETE /api/questions/:id
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    if !state.db.delete_question(id).await? {
        return Err(not_found(id));
    }

    Ok(Json(ApiResponse::ok(DeleteResponse {
        id,
        message: "Question deleted".to_string(),
        file_removed: false,
    })))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Question {id} not found"))
}

/// Check a question for internal consistency.
///
/// Multiple choice needs at least two options containing the answer; true/false
/// answers are normalized to "True"/"False".
fn validate_question(request: QuestionRequest) -> Result<NewQuestion> {
    let question = required(request.question, "question")?;
    let question_type =
        parse_enum(request.question_type.as_deref(), "type", QuestionType::from_str)?
            .unwrap_or_default();
    let mut correct_answer = required(request.correct_answer, "correct_answer")?;
    let mut options: Vec<String> = request
        .options
        .unwrap_or_default()
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    match question_type {
        QuestionType::MultipleChoice => {
            if options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "multiple choice questions need at least two options".to_string(),
                ));
            }
            if !options.iter().any(|o| o.eq_ignore_ascii_case(&correct_answer)) {
                return Err(ApiError::BadRequest(
                    "correct_answer must be one of the options".to_string(),
                ));
            }
        }
        QuestionType::TrueFalse => {
            correct_answer = match correct_answer.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" => "True".to_string(),
                "false" | "f" | "no" => "False".to_string(),
                _ => {
                    return Err(ApiError::BadRequest(
                        "correct_answer must be True or False".to_string(),
                    ))
                }
            };
            options = vec!["True".to_string(), "False".to_string()];
        }
        QuestionType::ShortAnswer => options.clear(),
    }

    Ok(NewQuestion {
        question,
        question_type,
        correct_answer,
        options,
        explanation: optional(request.explanation),
    })
}
