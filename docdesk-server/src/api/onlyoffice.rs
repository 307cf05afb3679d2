//! Document Server status proxy
//!
//! Lets the browser check the Document Server through this backend, which
//! avoids CORS problems and reports a readable reason when it is down.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

/// GET /api/onlyoffice/healthcheck
pub async fn onlyoffice_healthcheck(State(state): State<AppState>) -> Response {
    let server = state.docserver.base_url().to_string();
    info!("Checking Document Server health at {}", server);

    match state.docserver.healthcheck().await {
        Ok(data) => Json(json!({
            "success": true,
            "status": "connected",
            "data": data,
            "server": server,
        }))
        .into_response(),
        Err(e) => {
            error!("Document Server health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "status": "error",
                    "error": e.summary(),
                    "details": e.to_string(),
                    "server": server,
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/onlyoffice/info
pub async fn onlyoffice_info(State(state): State<AppState>) -> Response {
    let server = state.docserver.base_url().to_string();

    match state.docserver.info().await {
        Ok(info) => Json(json!({
            "success": true,
            "server": server,
            "status": info.status,
            "headers": info.headers,
        }))
        .into_response(),
        Err(e) => {
            error!("Document Server info failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Failed to get Document Server info",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
