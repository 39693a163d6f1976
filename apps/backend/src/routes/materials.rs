//! Material endpoints

use axum::{extract::State, Json};

use crate::db::MaterialFilter;
use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::*;
use crate::routes::{optional, parse_enum, required};
use crate::services::storage::StorageService;
use crate::AppState;

/// GET /api/materials?type=&status=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MaterialListQuery>,
) -> Result<Json<ApiResponse<MaterialListResponse>>> {
    let filter = MaterialFilter {
        material_type: parse_enum(query.material_type.as_deref(), "type", MaterialType::from_str)?,
        status: parse_enum(query.status.as_deref(), "status", MaterialStatus::from_str)?,
    };

    let materials = state.db.list_materials(filter).await?;

    Ok(Json(ApiResponse::ok(MaterialListResponse {
        materials: materials.iter().map(DbMaterial::to_api).collect(),
    })))
}

/// GET /api/materials/published
pub async fn list_published(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MaterialListResponse>>> {
    let materials = state
        .db
        .list_materials(MaterialFilter {
            material_type: None,
            status: Some(MaterialStatus::Published),
        })
        .await?;

    Ok(Json(ApiResponse::ok(MaterialListResponse {
        materials: materials.iter().map(DbMaterial::to_api).collect(),
    })))
}

/// GET /api/materials/:id
pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MaterialResponse>>> {
    let material = find_material(&state, id).await?;
    Ok(Json(ApiResponse::ok(MaterialResponse {
        material: material.to_api(),
    })))
}

/// POST /api/materials
pub async fn create(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateMaterialRequest>,
) -> Result<Json<ApiResponse<MaterialResponse>>> {
    let title = required(request.title, "title")?;
    let material_type =
        parse_enum(request.material_type.as_deref(), "type", MaterialType::from_str)?
            .unwrap_or(MaterialType::Text);
    let status = parse_enum(request.status.as_deref(), "status", MaterialStatus::from_str)?
        .unwrap_or_default();
    let file_path = file_key(request.file_path)?;

    let material = state
        .db
        .create_material(&NewMaterial {
            title,
            description: optional(request.description),
            material_type,
            status,
            file_path,
            content: request.content.as_ref().map(content_to_column),
            source_material_id: None,
        })
        .await?;

    tracing::info!(material_id = material.id, kind = material_type.as_str(), "Created material");

    Ok(Json(ApiResponse::ok(MaterialResponse {
        material: material.to_api(),
    })))
}

/// PATCH /api/materials/:id
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateMaterialRequest>,
) -> Result<Json<ApiResponse<MaterialResponse>>> {
    let mut current = find_material(&state, id).await?;

    // Apply updates
    if let Some(title) = request.title {
        current.title = required(Some(title), "title")?;
    }
    if let Some(description) = request.description {
        current.description = optional(Some(description));
    }
    if let Some(file_path) = request.file_path {
        current.file_path = file_key(Some(file_path))?;
    }
    if let Some(content) = request.content {
        current.content = Some(content_to_column(&content));
    }

    let updated = state
        .db
        .update_material(&current)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(ApiResponse::ok(MaterialResponse {
        material: updated.to_api(),
    })))
}

/// PATCH /api/materials/:id/status
///
/// Setting the status a material already has is not an error; the response
/// reports `changed: false` and the row is left untouched.
pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<StatusChangeResponse>>> {
    let status = parse_enum(request.status.as_deref(), "status", MaterialStatus::from_str)?
        .ok_or_else(|| ApiError::BadRequest("status is required".to_string()))?;

    let current = find_material(&state, id).await?;
    if current.publish_status() == status {
        return Ok(Json(ApiResponse::ok(StatusChangeResponse {
            changed: false,
            message: "Status unchanged".to_string(),
            material: current.to_api(),
        })));
    }

    let updated = state
        .db
        .set_material_status(id, status)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(material_id = id, status = status.as_str(), "Material status changed");

    Ok(Json(ApiResponse::ok(StatusChangeResponse {
        changed: true,
        message: format!("Material is now {}", status.as_str()),
        material: updated.to_api(),
    })))
}

/// DELETE /api/materials/:id
///
/// Removes the stored file (if any) on a best-effort basis, then the row and
/// its questions in one transaction.
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    let material = find_material(&state, id).await?;
    let file_removed = remove_material_files(&state, &material).await;

    if !state.db.delete_material(id).await? {
        return Err(not_found(id));
    }

    tracing::info!(material_id = id, file_removed, "Deleted material");

    Ok(Json(ApiResponse::ok(DeleteResponse {
        id,
        message: "Material deleted".to_string(),
        file_removed,
    })))
}

pub(crate) async fn find_material(state: &AppState, id: i64) -> Result<DbMaterial> {
    state.db.get_material(id).await?.ok_or_else(|| not_found(id))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Material {id} not found"))
}

/// Delete the stored file of a material and, for audio, its script file.
///
/// Failures are logged and swallowed.
///
/// # Returns
/// true if the main file was removed
pub(crate) async fn remove_material_files(state: &AppState, material: &DbMaterial) -> bool {
    let Some(key) = material.file_path.as_deref() else {
        return false;
    };
    let removed = state.storage.delete_file_best_effort(key).await;

    let script_path = material
        .content_value()
        .and_then(|c| c.get("script_path").and_then(|p| p.as_str()).map(str::to_string));
    if let Some(script_path) = script_path {
        state.storage.delete_file_best_effort(&script_path).await;
    }

    removed
}

/// Validated storage key for a client-supplied `file_path`; blank clears it.
fn file_key(file_path: Option<String>) -> Result<Option<String>> {
    optional(file_path)
        .map(|key| StorageService::validate_key(&key))
        .transpose()
        .map_err(ApiError::from)
}

/// Strings are stored as-is; other JSON values as JSON text.
fn content_to_column(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
