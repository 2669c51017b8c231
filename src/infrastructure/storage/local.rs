use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::AttachmentStore;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Attachment bytes on the local filesystem, one file per storage key.
#[derive(Clone)]
pub struct LocalAttachmentStore {
    base_path: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Keys are relative paths; anything escaping the base directory is rejected
    fn resolve_path(&self, key: &str) -> DomainResult<PathBuf> {
        let path = Path::new(key);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(DomainError::Validation(format!(
                "Invalid storage key: {}",
                key
            )));
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn put(&self, key: &str, content: &[u8]) -> DomainResult<()> {
        let file_path = self.resolve_path(key)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::StoreUnavailable(format!("Failed to create directory: {}", e))
            })?;
        }

        fs::write(&file_path, content)
            .await
            .map_err(|e| DomainError::StoreUnavailable(format!("Failed to write file: {}", e)))
    }

    async fn fetch(&self, key: &str) -> DomainResult<Vec<u8>> {
        let file_path = self.resolve_path(key)?;
        fs::read(&file_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                DomainError::NotFound(format!("Attachment content {} not found", key))
            }
            _ => DomainError::StoreUnavailable(format!("Failed to read file: {}", e)),
        })
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        let file_path = self.resolve_path(key)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::StoreUnavailable(format!(
                "Failed to delete file: {}",
                e
            ))),
        }
    }
}
