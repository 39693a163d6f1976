//! Audio lecture endpoints

use axum::{extract::State, Json};

use crate::db::MaterialFilter;
use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::*;
use crate::routes::materials::{find_material, remove_material_files};
use crate::routes::parse_enum;
use crate::services::generation;
use crate::AppState;

/// GET /api/audio?status=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MaterialListQuery>,
) -> Result<Json<ApiResponse<MaterialListResponse>>> {
    let materials = state
        .db
        .list_materials(MaterialFilter {
            material_type: Some(MaterialType::Audio),
            status: parse_enum(query.status.as_deref(), "status", MaterialStatus::from_str)?,
        })
        .await?;

    Ok(Json(ApiResponse::ok(MaterialListResponse {
        materials: materials.iter().map(DbMaterial::to_api).collect(),
    })))
}

/// POST /api/audio/generate
pub async fn generate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateAudioRequest>,
) -> Result<Json<ApiResponse<MaterialResponse>>> {
    let material_id = request
        .material_id
        .ok_or_else(|| ApiError::BadRequest("material_id is required".to_string()))?;

    let material = generation::generate_audio_lecture(&state, material_id, request.title).await?;

    Ok(Json(ApiResponse::ok(MaterialResponse {
        material: material.to_api(),
    })))
}

/// DELETE /api/audio/:id
///
/// The row is removed even if its audio file cannot be deleted.
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    let material = find_material(&state, id).await?;
    if material.kind() != MaterialType::Audio {
        return Err(ApiError::NotFound(format!("Audio material {id} not found")));
    }

    let file_removed = remove_material_files(&state, &material).await;
    if !state.db.delete_material(id).await? {
        return Err(ApiError::NotFound(format!("Audio material {id} not found")));
    }

    tracing::info!(audio_id = id, file_removed, "Deleted audio lecture");

    Ok(Json(ApiResponse::ok(DeleteResponse {
        id,
        message: "Audio material deleted".to_string(),
        file_removed,
    })))
}
