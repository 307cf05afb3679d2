//! docdesk-server library
//!
//! Backend for browser document editing: stores uploads, hands out signed
//! editor configurations for the external Document Server and writes back
//! edited revisions when the Document Server reports a save.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use docdesk_common::{Settings, TokenSigner};

pub mod api;
pub mod cache;
pub mod docserver;
pub mod editor;
pub mod error;
pub mod storage;

use cache::{ConfigCache, RateLimiter};
use docserver::{DocServerClient, DocServerError};
use storage::DocumentStore;

/// Multipart framing allowance on top of the per-file upload limit
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: DocumentStore,
    /// Editor configuration responses by file id
    pub configs: Arc<ConfigCache>,
    /// Fixed-window limiter for `GET /api/file/:id`
    pub limiter: Arc<RateLimiter>,
    pub docserver: DocServerClient,
    pub signer: TokenSigner,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings) -> Result<Self, DocServerError> {
        let limits = &settings.limits;
        let configs = Arc::new(ConfigCache::new(Duration::from_millis(
            limits.config_cache_ttl_ms,
        )));
        let limiter = Arc::new(RateLimiter::new(
            Duration::from_millis(limits.rate_limit_window_ms),
            limits.rate_limit_max_requests,
        ));

        Ok(Self {
            store: DocumentStore::new(settings.uploads_dir.clone(), settings.public_base_url.clone()),
            docserver: DocServerClient::new(&settings.document_server)?,
            signer: TokenSigner::new(&settings.document_server.jwt_secret),
            configs,
            limiter,
            settings: Arc::new(settings),
        })
    }
}

/// Build application router
///
/// Only `GET /api/file/:id` is rate limited; the Document Server's own
/// requests (`/uploads`, callbacks) are not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let file_routes = get(api::get_file_config)
        .route_layer(middleware::from_fn_with_state(state.clone(), api::rate_limit))
        .delete(api::delete_file);

    let cors = cors_layer(&state.settings);
    let body_limit = state.settings.limits.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let uploads = ServeDir::new(state.store.root());

    Router::new()
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/onlyoffice/healthcheck", get(api::onlyoffice_healthcheck))
        .route("/api/onlyoffice/info", get(api::onlyoffice_info))
        .route("/api/upload", post(api::upload_file))
        .route("/api/files", get(api::list_files))
        .route("/api/file/:id", file_routes)
        .route("/api/callback/:id", post(api::save_callback))
        .nest_service("/uploads", uploads)
        .fallback(api::endpoint_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Origins allowed to call the API
///
/// `"*"` cannot be sent together with `Access-Control-Allow-Credentials`,
/// so a wildcard entry echoes the request's own origin instead.
fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|origin| origin == "*") {
        return AllowOrigin::mirror_request();
    }

    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    AllowOrigin::list(values)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(&settings.cors.allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
