//! PDF upload endpoint

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::optional;
use crate::services::pdf::looks_like_pdf;
use crate::services::storage::{StorageService, UPLOADS_DIR};
use crate::AppState;

const PDF_MIME: &str = "application/pdf";

struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// POST /api/upload
///
/// Multipart form with a `file` part (PDF) and optional `title` and
/// `description` text parts. The file is stored under `uploads/` and a draft
/// pdf material is created for it.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>> {
    let mut file = None;
    let mut title = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "title" => title = optional(Some(field.text().await.map_err(multipart_error)?)),
            "description" => {
                description = optional(Some(field.text().await.map_err(multipart_error)?))
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("file is required".to_string()))?;
    validate_pdf(&file)?;

    let key = StorageService::make_key(UPLOADS_DIR, "pdf");
    state.storage.save_file(&key, &file.bytes).await?;

    let title = title.unwrap_or_else(|| title_from_file_name(&file.file_name));
    let created = state
        .db
        .create_material(&NewMaterial {
            title,
            description,
            material_type: MaterialType::Pdf,
            status: MaterialStatus::Draft,
            file_path: Some(key.clone()),
            content: None,
            source_material_id: None,
        })
        .await;

    let material = match created {
        Ok(material) => material,
        Err(e) => {
            state.storage.delete_file_best_effort(&key).await;
            return Err(e);
        }
    };

    tracing::info!(
        material_id = material.id,
        file = %file.file_name,
        bytes = file.bytes.len(),
        "Uploaded PDF"
    );

    Ok(Json(ApiResponse::ok(UploadResponse {
        material: material.to_api(),
        file_name: file.file_name,
        size: file.bytes.len(),
    })))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Uploaded file is too large".to_string())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Accept only non-empty PDFs declared as `application/pdf`.
fn validate_pdf(file: &UploadedFile) -> Result<()> {
    let declared_pdf = file
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().eq_ignore_ascii_case(PDF_MIME))
        .unwrap_or(false);
    if !declared_pdf {
        return Err(ApiError::BadRequest("Only PDF files can be uploaded".to_string()));
    }
    if file.bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if !looks_like_pdf(&file.bytes) {
        return Err(ApiError::BadRequest(
            "Uploaded file is not a valid PDF".to_string(),
        ));
    }
    Ok(())
}

/// `scrum-guide_2020.pdf` → `scrum-guide_2020`
fn title_from_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    if stem.trim().is_empty() {
        "Untitled PDF".to_string()
    } else {
        stem.trim().to_string()
    }
}
