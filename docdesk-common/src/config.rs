//! Configuration loading and config file resolution
//!
//! Settings come from, in priority order:
//! 1. Command-line arguments (applied by the binary on top of the result)
//! 2. TOML config file: `DOCDESK_CONFIG`, then the per-user config
//!    directory, then `/etc/docdesk/config.toml`
//! 3. Compiled defaults
//!
//! A missing config file is not an error: defaults are used and a warning is
//! logged. A file that exists but does not parse is a configuration error.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DOCDESK_CONFIG";

/// Complete service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Base URL browsers use to reach this service (file download links)
    pub public_base_url: String,

    /// Base URL the Document Server uses to reach this service
    ///
    /// Differs from `public_base_url` when the Document Server runs in a
    /// container (`host.docker.internal`).
    pub callback_base_url: String,

    /// Directory holding uploaded documents
    pub uploads_dir: PathBuf,

    pub document_server: DocumentServerConfig,
    pub editor: EditorDefaults,
    pub cors: CorsConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// External Document Server connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentServerConfig {
    pub url: String,

    /// Shared HS256 secret; empty disables signing
    pub jwt_secret: String,

    pub timeout_ms: u64,
    pub user_agent: String,
}

/// Values written into every editor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorDefaults {
    /// `edit` or `view`
    pub mode: String,
    pub lang: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Request limits and cache timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub config_cache_ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_base_url: "http://localhost:3001".to_string(),
            callback_base_url: "http://host.docker.internal:3001".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            document_server: DocumentServerConfig::default(),
            editor: EditorDefaults::default(),
            cors: CorsConfig::default(),
            limits: LimitsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DocumentServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8888".to_string(),
            jwt_secret: "secret".to_string(),
            timeout_ms: 5000,
            user_agent: "OnlyOffice-Proxy/1.0".to_string(),
        }
    }
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            mode: "edit".to_string(),
            lang: "id".to_string(),
            user_id: "user-1".to_string(),
            user_name: "User".to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8888".to_string(),
            ],
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            rate_limit_window_ms: 1000,
            rate_limit_max_requests: 5,
            config_cache_ttl_ms: 60_000,
            sweep_interval_ms: 60_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.editor.mode != "edit" && self.editor.mode != "view" {
            return Err(Error::Config(format!(
                "editor.mode must be 'edit' or 'view', got '{}'",
                self.editor.mode
            )));
        }
        if self.limits.rate_limit_max_requests == 0 {
            return Err(Error::Config(
                "limits.rate_limit_max_requests must be at least 1".to_string(),
            ));
        }
        if self.limits.rate_limit_window_ms == 0 || self.limits.sweep_interval_ms == 0 {
            return Err(Error::Config(
                "limits.rate_limit_window_ms and limits.sweep_interval_ms must be non-zero"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Document Server URL without a trailing slash
    pub fn document_server_url(&self) -> &str {
        self.document_server.url.trim_end_matches('/')
    }
}

/// Find the config file to load
///
/// Priority: explicit argument, `DOCDESK_CONFIG`, user config dir,
/// `/etc/docdesk/config.toml`. Only the first two are returned without an
/// existence check; the well-known locations are skipped when absent.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: well-known locations
    let user_config = dirs::config_dir().map(|d| d.join("docdesk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/docdesk/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load settings from `path`, or defaults when no file was found
///
/// An explicitly named file that does not exist is an error; silently
/// ignoring a typo in `--config` would run the service with the wrong
/// secret.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
            })?;
            let settings = Settings::from_toml_str(&content)?;
            info!("Loaded configuration from {}", path.display());
            Ok(settings)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(Settings::default())
        }
    }
}
