//! Document upload, listing, deletion and editor configuration

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use docdesk_common::document::{self, validate_file_id};

use crate::editor::EditorConfig;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field carrying the uploaded document
pub const UPLOAD_FIELD: &str = "document";

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".to_string())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// POST /api/upload
///
/// Accepts one file in the `document` field. Other fields are ignored.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if !document::is_allowed(&original_name) {
            return Err(ApiError::BadRequest("File type not supported".to_string()));
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > state.settings.limits.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge("File too large".to_string()));
        }

        let file = state.store.save(&original_name, &bytes).await?;
        info!("File uploaded: {} -> {}", file.name, file.id);

        return Ok(Json(json!({
            "success": true,
            "message": "File uploaded successfully",
            "file": file,
        })));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

/// GET /api/files
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let files = state.store.list().await.map_err(|e| {
        error!("Error listing files: {}", e);
        ApiError::Internal("Failed to list files".to_string())
    })?;

    info!("Files list requested, found {} files", files.len());
    Ok(Json(json!({ "success": true, "files": files })))
}

/// GET /api/file/:id
///
/// Editor configuration for one document, served from the config cache
/// while fresh. Cached responses are returned without touching the disk.
pub async fn get_file_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    validate_file_id(&id)?;

    if let Some(cached) = state.configs.get(&id) {
        debug!("Returning cached config for {}", id);
        return Ok(Json(cached));
    }

    info!("Getting file info for {}", id);
    let generation = state.configs.generation();
    let stat = match state.store.stat(&id).await {
        Ok(stat) => stat,
        Err(docdesk_common::Error::NotFound(_)) => {
            return Err(ApiError::NotFound("File not found".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let config = EditorConfig::build(&state.settings, &id, &stat).signed(&state.signer)?;
    debug!(
        "Config for {}: fileType={}, key={}",
        id, config.document.file_type, config.document.key
    );

    let response = json!({
        "success": true,
        "config": config,
        "documentServerUrl": state.settings.document_server_url(),
    });
    state.configs.insert(&id, response.clone(), generation);

    info!("Generated new config for {}", id);
    Ok(Json(response))
}

/// DELETE /api/file/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    info!("Deleting file {}", id);

    match state.store.delete(&id).await {
        Ok(()) => {}
        Err(docdesk_common::Error::NotFound(_)) => {
            return Err(ApiError::NotFound("File not found".to_string()))
        }
        Err(e) => return Err(e.into()),
    }
    state.configs.invalidate(&id);

    info!("File deleted successfully: {}", id);
    Ok(Json(json!({
        "success": true,
        "message": "File deleted successfully",
    })))
}
