use crate::domain::errors::DomainResult;
use async_trait::async_trait;

/// Opaque blob store for attachment bytes, keyed by storage key.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Save bytes under `key`
    async fn put(&self, key: &str, content: &[u8]) -> DomainResult<()>;

    /// Read the bytes stored under `key`
    async fn fetch(&self, key: &str) -> DomainResult<Vec<u8>>;

    /// Delete the bytes under `key`; missing keys are not an error
    async fn delete(&self, key: &str) -> DomainResult<()>;
}
