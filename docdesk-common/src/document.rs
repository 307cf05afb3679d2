//! Document classification and identity
//!
//! Pure functions deciding which uploads are accepted, how the Document
//! Server should open them, and the cache key it uses to recognise a
//! particular revision of a file.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Extensions accepted for upload (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".docx", ".xlsx", ".pptx", ".doc", ".xls", ".ppt", ".pdf", ".txt",
];

/// Prefix of every stored file name (the multipart field name)
pub const STORED_NAME_PREFIX: &str = "document";

/// Editor family the Document Server opens a file with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Text,
    Spreadsheet,
    Presentation,
}

impl DocumentType {
    /// Classify by extension (with or without the leading dot)
    ///
    /// Unknown extensions fall back to [`DocumentType::Text`].
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "doc" | "docx" | "txt" | "rtf" | "odt" => DocumentType::Text,
            "xls" | "xlsx" | "ods" | "csv" => DocumentType::Spreadsheet,
            "ppt" | "pptx" | "odp" => DocumentType::Presentation,
            _ => DocumentType::Text,
        }
    }

    /// Classify a file name by its extension
    pub fn for_file(name: &str) -> Self {
        Self::from_extension(&extension_of(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Text => "text",
            DocumentType::Spreadsheet => "spreadsheet",
            DocumentType::Presentation => "presentation",
        }
    }
}

/// Extension including the leading dot, as written in `name`
///
/// Returns an empty string when the name has no extension. Dotfiles such as
/// `.docx` have no extension, matching the usual path semantics.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

/// Whether an uploaded file name carries an accepted extension
pub fn is_allowed(name: &str) -> bool {
    let ext = extension_of(name).to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

/// Document Server `fileType`: the extension without its dot
pub fn file_type(id: &str) -> String {
    extension_of(id).trim_start_matches('.').to_string()
}

/// Revision key handed to the Document Server
///
/// Hex MD5 of the file id followed by its modification time in milliseconds.
/// Any rewrite of the file changes the key, so editors never reuse a stale
/// cached copy.
pub fn document_key(id: &str, modified_ms: i64) -> String {
    let mut hasher = Md5::new();
    hasher.update(id.as_bytes());
    hasher.update(modified_ms.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject ids that could escape the uploads directory
pub fn validate_file_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidInput("Empty file id".to_string()));
    }
    if id.contains('/') || id.contains('\\') || id.contains('\0') || id.contains("..") {
        return Err(Error::InvalidInput(format!("Invalid file id: {}", id)));
    }
    Ok(())
}

/// Name under which an upload is stored: `document-<ms>-<random><ext>`
pub fn stored_name(original: &str, now_ms: i64, random: u32) -> String {
    format!(
        "{}-{}-{}{}",
        STORED_NAME_PREFIX,
        now_ms,
        random,
        extension_of(original)
    )
}
