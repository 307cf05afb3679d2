//! HTTP API handlers for docdesk-server

pub mod buildinfo;
pub mod callback;
pub mod files;
pub mod health;
pub mod onlyoffice;
pub mod rate_limit;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub use buildinfo::get_build_info;
pub use callback::save_callback;
pub use files::{delete_file, get_file_config, list_files, upload_file};
pub use health::{health_check, health_routes};
pub use onlyoffice::{onlyoffice_healthcheck, onlyoffice_info};
pub use rate_limit::rate_limit;

/// Fallback for unknown routes
pub async fn endpoint_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}
