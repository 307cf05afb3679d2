//! Document Server save callback
//!
//! The Document Server POSTs editing status changes to the `callbackUrl`
//! from the editor configuration. When a document is ready to save it
//! includes a `url` from which the edited revision must be downloaded.
//!
//! The reply body is `{"error": 0}` on success. Any other value tells the
//! Document Server the save failed and it keeps the document open.
//!
//! With a JWT secret configured every callback must be signed, either in the
//! body's `token` field or in an `Authorization: Bearer` header. Unsigned
//! callbacks are only accepted when signing is disabled.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use docdesk_common::document::validate_file_id;
use docdesk_common::{Error, TokenSigner};

use crate::error::ApiResult;
use crate::AppState;

/// Callback status codes sent by the Document Server
pub mod status {
    pub const EDITING: i64 = 1;
    pub const READY_FOR_SAVING: i64 = 2;
    pub const SAVE_ERROR: i64 = 3;
    pub const CLOSED_NO_CHANGES: i64 = 4;
    pub const FORCE_SAVE: i64 = 6;
    pub const FORCE_SAVE_ERROR: i64 = 7;
}

/// Fields this service reads from a callback body
#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    pub status: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl CallbackBody {
    /// Whether this notification carries a revision to store
    pub fn carries_revision(&self) -> bool {
        matches!(self.status, status::READY_FOR_SAVING | status::FORCE_SAVE)
    }
}

fn reply(code: u8) -> Json<Value> {
    Json(json!({ "error": code }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// The callback body to act on
///
/// The verified token payload is authoritative. Header tokens wrap the
/// callback fields in a `payload` object.
fn authenticated_body(
    signer: &TokenSigner,
    headers: &HeaderMap,
    raw: Value,
) -> Result<Value, Error> {
    if !signer.is_enabled() {
        return Ok(raw);
    }
    if let Some(token) = raw.get("token").and_then(Value::as_str) {
        return signer.verify(token);
    }
    let token = bearer_token(headers)
        .ok_or_else(|| Error::Token("Missing callback token".to_string()))?;
    let mut payload = signer.verify(token)?;
    if let Some(inner) = payload.get_mut("payload") {
        return Ok(inner.take());
    }
    Ok(payload)
}

/// POST /api/callback/:id
///
/// The body is read as raw bytes so that a missing content type or
/// malformed JSON still gets a `{"error": 1}` reply.
pub async fn save_callback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    validate_file_id(&id)?;

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Unparseable callback for {}: {}", id, e);
            return Ok(reply(1));
        }
    };

    let body_value = match authenticated_body(&state.signer, &headers, raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Rejected callback for {}: {}", id, e);
            return Ok(reply(1));
        }
    };

    let body: CallbackBody = match serde_json::from_value(body_value) {
        Ok(body) => body,
        Err(e) => {
            warn!("Malformed callback for {}: {}", id, e);
            return Ok(reply(1));
        }
    };

    info!(
        "Document Server callback received: file={}, status={}, key={:?}",
        id, body.status, body.key
    );

    if matches!(body.status, status::SAVE_ERROR | status::FORCE_SAVE_ERROR) {
        warn!("Document Server reported a save error for {}", id);
    }

    if !body.carries_revision() {
        return Ok(reply(0));
    }

    let Some(url) = body.url.as_deref() else {
        warn!("Save callback for {} has no download url", id);
        return Ok(reply(1));
    };

    info!("Saving document from {} to {}", url, id);
    let bytes = match state.docserver.download(url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Error downloading edited document {}: {}", id, e);
            return Ok(reply(1));
        }
    };

    if let Err(e) = state.store.replace(&id, &bytes).await {
        error!("Error writing edited document {}: {}", id, e);
        return Ok(reply(1));
    }
    state.configs.invalidate(&id);

    info!("File {} saved successfully ({} bytes)", id, bytes.len());
    Ok(reply(0))
}
