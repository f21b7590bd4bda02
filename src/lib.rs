//! Multi-tenant virtual filesystem engine.
//!
//! Files and directories are versioned documents held in a document
//! store, with file bytes living in a separate blob store. The engine
//! owns the rules for valid transitions between document revisions:
//! path resolution, name uniqueness, content verification, optimistic
//! concurrency, and the trash lifecycle. The HTTP boundary and the
//! real storage backends live outside this crate and talk to it
//! through [`Vfs`] and the [`store`] traits.

pub mod error;
pub mod consts;
pub mod instance;
pub mod doc;
pub mod store;
pub mod path;
pub mod vfs;

pub use error::{Error, ErrorKind, Result};
pub use instance::Instance;
pub use vfs::Vfs;
