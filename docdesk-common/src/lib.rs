//! # docdesk Common Library
//!
//! Shared code for the docdesk document service:
//! - Configuration loading and resolution
//! - Document classification and cache keys
//! - Signed configuration tokens (HS256 JWT)
//! - Common error type

pub mod config;
pub mod document;
pub mod error;
pub mod token;

pub use config::Settings;
pub use document::DocumentType;
pub use error::{Error, Result};
pub use token::TokenSigner;
