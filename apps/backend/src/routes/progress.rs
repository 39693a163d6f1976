//! Progress tracking endpoints

use axum::{extract::State, Json};

use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiQuery};
use crate::models::*;
use crate::routes::required;
use crate::AppState;

/// GET /api/progress?user_id=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<ApiResponse<ProgressListResponse>>> {
    let user_id = required(query.user_id, "user_id")?;
    let progress = state.db.list_progress(&user_id).await?;
    Ok(Json(ApiResponse::ok(ProgressListResponse { progress })))
}

/// POST /api/progress
///
/// Creates or updates the record for `(user_id, content_id)`. Fields left out
/// keep their stored value.
pub async fn update(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateProgressRequest>,
) -> Result<Json<ApiResponse<ProgressResponse>>> {
    let user_id = required(request.user_id, "user_id")?;
    let content_id = required(request.content_id, "content_id")?;

    let mut current = state
        .db
        .get_progress(&user_id, &content_id)
        .await?
        .unwrap_or_else(|| DbProgress::new_for(&user_id, &content_id));

    // Apply updates
    if let Some(percent) = request.progress_percent {
        current.progress_percent = percentage(percent, "progress_percent")?;
    }
    if let Some(score) = request.score {
        current.score = Some(percentage(score, "score")?);
    }
    if let Some(seconds) = request.time_spent_seconds {
        if seconds < 0 {
            return Err(ApiError::BadRequest(
                "time_spent_seconds must not be negative".to_string(),
            ));
        }
        current.time_spent_seconds = seconds;
    }
    if let Some(completed) = request.completed {
        current.completed = completed;
        if completed {
            current.progress_percent = 100.0;
        }
    }

    let progress = state.db.upsert_progress(&current).await?;
    Ok(Json(ApiResponse::ok(ProgressResponse { progress })))
}

/// GET /api/progress/summary?user_id=
pub async fn summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<ApiResponse<ProgressSummaryResponse>>> {
    let user_id = required(query.user_id, "user_id")?;
    let summary = state.db.progress_summary(&user_id).await?;
    Ok(Json(ApiResponse::ok(ProgressSummaryResponse { summary })))
}

fn percentage(value: f64, field: &str) -> Result<f64> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!("{field} must be between 0 and 100")))
    }
}
