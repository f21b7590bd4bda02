use async_trait::async_trait;
use nimbus_lib::ids::RevToken;

use crate::doc::Node;
use super::StoreError;

/// outcome of a compare-and-swap write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    /// the write landed; the new revision token is returned
    Ok(RevToken),
    /// the base revision was stale. the caller decides whether to
    /// reload and retry
    Conflict,
}

/// document database collaborator. owns the persisted representation
/// and generates revision tokens; the engine only forwards the
/// expected revision and interprets the rejection
#[async_trait]
pub trait DocStore: Send + Sync {
    async fn get(&self, ns: &str, id: &str) -> Result<Option<Node>, StoreError>;

    /// inserts a new document and stamps its first revision token.
    /// fails with [`StoreError::AlreadyExists`] if the id is taken
    async fn insert(&self, ns: &str, node: &Node) -> Result<RevToken, StoreError>;

    /// compare-and-swap update: the write is rejected unless the
    /// node's revision matches the stored one
    async fn update(&self, ns: &str, node: &Node) -> Result<CasResult, StoreError>;

    /// unconditional delete. returns whether the document existed
    async fn remove(&self, ns: &str, id: &str) -> Result<bool, StoreError>;

    /// all documents whose parent is `parent`, unordered
    async fn children(&self, ns: &str, parent: &str) -> Result<Vec<Node>, StoreError>;
}
