use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sanitize_filename::sanitize;

use super::AppState;
use crate::auth::middleware::AgentIdentity;
use crate::error::ServiceError;
use crate::quote::model::{QuoteAttachment, QuoteFile, StoredFile};

/// Uploads live under `{output}/uploads/{quote_id}/`.
pub const UPLOAD_DIR: &str = "uploads";

impl AppState {
    pub fn upload_dir(&self, quote_id: &str) -> PathBuf {
        self.renderer.output_dir().join(UPLOAD_DIR).join(quote_id)
    }

    /// Store an uploaded file next to the quote. Re-uploading a name replaces
    /// the earlier file.
    pub async fn upload_attachment(
        &self,
        agent: &AgentIdentity,
        id: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<QuoteAttachment, ServiceError> {
        let filename = sanitize(filename);
        if filename.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Uploaded file needs a usable file name".to_string(),
            ));
        }

        let quote = self.get_quote(agent, id).await?;
        if quote
            .find_file(&filename)
            .is_some_and(|file| file.quote_type.is_some())
        {
            return Err(ServiceError::Conflict(format!(
                "'{}' is a generated document of quote '{}'",
                filename, id
            )));
        }

        let dir = self.upload_dir(id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::Internal(format!("creating {}: {}", dir.display(), e)))?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ServiceError::Internal(format!("writing {}: {}", path.display(), e)))?;

        let attachment = QuoteAttachment {
            filename: filename.clone(),
            path: path.to_string_lossy().into_owned(),
            size: data.len() as u64,
            uploaded_at: Utc::now(),
        };
        let stored = attachment.clone();
        self.modify_quote(id, move |quote| {
            Self::ensure_owner(agent, quote)?;
            quote.attachments.retain(|a| a.filename != stored.filename);
            quote.attachments.push(stored);
            quote.updated_at = Utc::now();
            Ok(())
        })
        .await?;

        log::info!(
            "Agent {} uploaded {} ({} bytes) to quote {}",
            agent.id,
            filename,
            attachment.size,
            id
        );
        Ok(attachment)
    }

    /// Every file of the quote that is still on disk.
    pub async fn list_quote_files(
        &self,
        agent: &AgentIdentity,
        id: &str,
    ) -> Result<Vec<QuoteFile>, ServiceError> {
        let quote = self.get_quote(agent, id).await?;

        let mut files = Vec::new();
        for stored in quote.stored_files() {
            match tokio::fs::metadata(&stored.path).await {
                Ok(meta) => files.push(QuoteFile {
                    filename: stored.filename,
                    kind: stored.kind,
                    quote_type: stored.quote_type,
                    size: meta.len(),
                    modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
                }),
                Err(e) => log::debug!("Skipping {} of quote {}: {}", stored.path, id, e),
            }
        }
        Ok(files)
    }

    pub async fn find_quote_file(
        &self,
        agent: &AgentIdentity,
        id: &str,
        filename: &str,
    ) -> Result<StoredFile, ServiceError> {
        let quote = self.get_quote(agent, id).await?;
        quote.find_file(filename).ok_or_else(|| {
            ServiceError::NotFound(format!("Quote '{}' has no file '{}'", id, filename))
        })
    }

    /// Drop one file from the quote record, then from disk.
    pub async fn delete_quote_file(
        &self,
        agent: &AgentIdentity,
        id: &str,
        filename: &str,
    ) -> Result<(), ServiceError> {
        let mut removed = Vec::new();
        self.modify_quote(id, |quote| {
            Self::ensure_owner(agent, quote)?;
            let file = quote.find_file(filename).ok_or_else(|| {
                ServiceError::NotFound(format!("Quote '{}' has no file '{}'", id, filename))
            })?;
            removed = quote.forget_file(&file);
            quote.updated_at = Utc::now();
            Ok(())
        })
        .await?;

        remove_files(&removed).await;
        log::info!("Agent {} deleted {} from quote {}", agent.id, filename, id);
        Ok(())
    }
}

/// Best effort: the record no longer points at these paths.
pub(super) async fn remove_files<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        match tokio::fs::remove_file(path).await {
            Ok(()) => log::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

pub(super) async fn remove_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => log::debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {}", dir.display(), e),
    }
}
