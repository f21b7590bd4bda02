//! External storage collaborators.
//!
//! The engine owns no durable state. Document metadata lives behind
//! [`DocStore`], file bytes behind [`BlobStore`]; both are namespaced
//! by tenant on every call. The in-memory backends exist for tests
//! and embedders, real deployments plug database and object storage
//! implementations in behind the same traits.

use nimbus_lib::ids::{self, RevToken};

pub mod docs;
pub use docs::{DocStore, CasResult};

pub mod blob;
pub use blob::{BlobStore, BlobWriter, BlobReader};

pub mod memory;
pub use memory::{MemoryDocStore, MemoryBlobStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document already exists: {0}")]
    AlreadyExists(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// stamps the successor of a revision token. tokens are
/// "{generation}-{uid}"; only the store calls this
pub fn next_rev(current: Option<&RevToken>) -> RevToken {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(generation, _)| generation.parse::<u64>().ok())
        .unwrap_or(0);

    format!("{}-{}", generation + 1, ids::create_uid())
}
