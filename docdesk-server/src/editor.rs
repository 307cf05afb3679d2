//! Editor configuration for the Document Server
//!
//! Builds the JSON object a browser passes to the Document Server's editor
//! API to open one stored file. Field names follow the Document Server's
//! camelCase convention.

use serde::Serialize;

use docdesk_common::config::Settings;
use docdesk_common::document::{self, DocumentType};
use docdesk_common::{Result, TokenSigner};

use crate::storage::FileStat;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub file_type: String,
    /// Revision key; changes whenever the file is rewritten
    pub key: String,
    pub title: String,
    /// Where the Document Server downloads the file from
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditorUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorOptions {
    pub mode: String,
    pub lang: String,
    /// Where the Document Server posts save notifications
    pub callback_url: String,
    pub user: EditorUser,
}

/// Complete editor configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub document: DocumentInfo,
    pub document_type: DocumentType,
    pub editor_config: EditorOptions,
    pub height: String,
    pub width: String,
    /// HS256 signature over every other field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl EditorConfig {
    /// Unsigned configuration for file `id`
    pub fn build(settings: &Settings, id: &str, stat: &FileStat) -> Self {
        let base = settings.callback_base_url.trim_end_matches('/');

        Self {
            document: DocumentInfo {
                file_type: document::file_type(id),
                key: document::document_key(id, stat.modified_ms),
                title: id.to_string(),
                url: format!("{}/uploads/{}", base, id),
            },
            document_type: DocumentType::for_file(id),
            editor_config: EditorOptions {
                mode: settings.editor.mode.clone(),
                lang: settings.editor.lang.clone(),
                callback_url: format!("{}/api/callback/{}", base, id),
                user: EditorUser {
                    id: settings.editor.user_id.clone(),
                    name: settings.editor.user_name.clone(),
                },
            },
            height: "100%".to_string(),
            width: "100%".to_string(),
            token: None,
        }
    }

    /// Attach a token signed over the configuration without the token field
    pub fn signed(mut self, signer: &TokenSigner) -> Result<Self> {
        self.token = None;
        self.token = signer.sign_optional(&self)?;
        Ok(self)
    }
}
