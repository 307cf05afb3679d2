//! Uploaded document storage
//!
//! Flat directory of files named by their id. Nothing else is persisted:
//! file size, dates and the revision key are all derived from filesystem
//! metadata on demand.

use chrono::{DateTime, SecondsFormat, Utc};
use docdesk_common::document::{self, validate_file_id};
use docdesk_common::{Error, Result};
use rand::Rng;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Listing entry for `GET /api/files`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub url: String,
    pub upload_date: String,
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    /// Name the client uploaded the file under
    pub name: String,
    pub size: u64,
    pub path: String,
    pub url: String,
    pub upload_date: String,
}

/// Metadata needed to build an editor configuration
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: u64,
    /// Modification time, milliseconds since the Unix epoch
    pub modified_ms: i64,
}

/// Uploads directory plus the public URL it is served under
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    public_base_url: String,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the uploads directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Browser-facing download URL for a stored file
    pub fn public_url(&self, id: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, id)
    }

    /// Path of a stored file, rejecting ids that leave the directory
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_file_id(id)?;
        Ok(self.root.join(id))
    }

    /// Store a new upload under a fresh unique name
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        if !document::is_allowed(original_name) {
            return Err(Error::InvalidInput("File type not supported".to_string()));
        }

        let id = {
            let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
            document::stored_name(original_name, Utc::now().timestamp_millis(), suffix)
        };
        let path = self.path_for(&id)?;

        tokio::fs::write(&path, bytes).await?;
        info!("Stored upload '{}' as {} ({} bytes)", original_name, id, bytes.len());

        Ok(StoredFile {
            url: self.public_url(&id),
            name: original_name.to_string(),
            size: bytes.len() as u64,
            path: path.display().to_string(),
            upload_date: iso8601(SystemTime::now()),
            id,
        })
    }

    /// Size and modification time of a stored file
    pub async fn stat(&self, id: &str) -> Result<FileStat> {
        let path = self.path_for(id)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(Error::NotFound(id.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(FileStat {
            size: metadata.len(),
            modified_ms: millis_since_epoch(metadata.modified()?),
        })
    }

    /// All stored files, sorted by id
    ///
    /// A missing uploads directory is an empty listing, not an error.
    pub async fn list(&self) -> Result<Vec<FileEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(id) = entry.file_name().into_string() else {
                continue;
            };
            // In-flight replacements
            if id.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let uploaded = metadata.created().or_else(|_| metadata.modified())?;
            files.push(FileEntry {
                url: self.public_url(&id),
                name: id.clone(),
                size: metadata.len(),
                upload_date: iso8601(uploaded),
                id,
            });
        }

        files.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(files)
    }

    /// Remove a stored file
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite a stored file with an edited revision
    ///
    /// Writes to a hidden sibling first and renames it into place so readers
    /// never observe a partially written document.
    pub async fn replace(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(id)?;
        let tmp = {
            let suffix: u32 = rand::thread_rng().gen();
            self.root.join(format!(".{}.{}.tmp", id, suffix))
        };

        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Replaced {} ({} bytes)", id, bytes.len());
        Ok(())
    }
}

fn millis_since_epoch(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn iso8601(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> DocumentStore {
        DocumentStore::new(dir, "http://localhost:3001/")
    }

    #[tokio::test]
    async fn test_save_and_stat() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let stored = store.save("Report.docx", b"hello").await.unwrap();
        assert!(stored.id.starts_with("document-"));
        assert!(stored.id.ends_with(".docx"));
        assert_eq!(stored.name, "Report.docx");
        assert_eq!(stored.size, 5);
        assert_eq!(stored.url, format!("http://localhost:3001/uploads/{}", stored.id));

        let stat = store.stat(&stored.id).await.unwrap();
        assert_eq!(stat.size, 5);
        assert!(stat.modified_ms > 0);
    }

    #[tokio::test]
    async fn test_save_rejects_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).save("run.exe", b"MZ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir.path().join("does-not-exist"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.xlsx"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.docx"), b"a").unwrap();
        std::fs::write(dir.path().join(".a.docx.1.tmp"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = store(dir.path()).list().await.unwrap();
        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a.docx", "b.xlsx"]);
        assert_eq!(files[1].size, 2);
        assert_eq!(files[0].name, "a.docx");
        assert!(files[0].upload_date.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.docx"), b"a").unwrap();
        let store = store(dir.path());

        store.delete("a.docx").await.unwrap();
        assert!(!dir.path().join("a.docx").exists());
        assert!(matches!(store.delete("a.docx").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replace_overwrites_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.docx"), b"old").unwrap();
        let store = store(dir.path());

        store.replace("a.docx", b"new revision").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.docx")).unwrap(), b"new revision");
        // No temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(store.stat("../secret").await, Err(Error::InvalidInput(_))));
        assert!(matches!(store.delete("..").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_stat_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store(dir.path()).stat("ghost.docx").await,
            Err(Error::NotFound(_))
        ));
    }
}
