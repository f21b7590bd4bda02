use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::StoreError;

pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// byte stream storage collaborator, addressed by opaque keys derived
/// from document identity. independent of the document store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// opens a write for a new blob. the blob stays invisible to
    /// [`open`](Self::open) until the writer commits
    async fn create(&self, ns: &str, key: &str) -> Result<Box<dyn BlobWriter>, StoreError>;

    async fn open(&self, ns: &str, key: &str) -> Result<Option<BlobReader>, StoreError>;

    /// returns whether the blob existed
    async fn remove(&self, ns: &str, key: &str) -> Result<bool, StoreError>;
}

/// append-only-then-commit write handle. dropping a writer without
/// committing must leave no visible blob
#[async_trait]
pub trait BlobWriter: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StoreError>;

    /// publishes the accumulated bytes under the writer's key
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// discards the accumulated bytes
    async fn abort(self: Box<Self>) -> Result<(), StoreError>;
}
