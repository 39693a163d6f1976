//! Coaching advice endpoints

use axum::{extract::State, Json};

use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::*;
use crate::routes::{parse_enum, required};
use crate::services::generation;
use crate::AppState;

/// GET /api/advice?user_id=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<ApiResponse<AdviceListResponse>>> {
    let user_id = required(query.user_id, "user_id")?;
    let advice = state.db.list_advice(&user_id).await?;
    Ok(Json(ApiResponse::ok(AdviceListResponse {
        advice: advice.iter().map(DbAdvice::to_api).collect(),
    })))
}

/// POST /api/advice/generate
pub async fn generate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateAdviceRequest>,
) -> Result<Json<ApiResponse<AdviceResponse>>> {
    let user_id = required(request.user_id, "user_id")?;
    let advice_type = parse_enum(request.advice_type.as_deref(), "type", AdviceType::from_str)?
        .unwrap_or_default();

    let advice = generation::generate_advice(&state, &user_id, advice_type).await?;
    Ok(Json(ApiResponse::ok(AdviceResponse {
        advice: advice.to_api(),
    })))
}

/// DELETE /api/advice/:id
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    if !state.db.delete_advice(id).await? {
        return Err(ApiError::NotFound(format!("Advice {id} not found")));
    }

    Ok(Json(ApiResponse::ok(DeleteResponse {
        id,
        message: "Advice deleted".to_string(),
        file_removed: false,
    })))
}
