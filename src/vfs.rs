use std::sync::Arc;

use nimbus_lib::ids::DocId;

use crate::consts;
use crate::doc::{Node, DirDoc, FileDoc};
use crate::error::{Error, ErrorKind, Detail, Result};
use crate::instance::Instance;
use crate::store::{DocStore, BlobStore, StoreError, CasResult};

pub mod create;
pub mod content;
pub mod patch;
pub mod trash;
pub mod serve;

pub use content::{NewFile, Overwrite};
pub use serve::{Content, Disposition};

/// the engine. stateless between requests; all durable state lives in
/// the two stores, scoped to the owning [`Instance`] on every call
pub struct Vfs {
    instance: Instance,
    docs: Arc<dyn DocStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Vfs {
    pub fn new(instance: Instance, docs: Arc<dyn DocStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Vfs { instance, docs, blobs }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub(crate) fn ns(&self) -> &str {
        self.instance.namespace()
    }

    pub(crate) fn docs(&self) -> &dyn DocStore {
        &*self.docs
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStore {
        &*self.blobs
    }

    /// creates the root and trash directories if this namespace has
    /// never been used. losing a concurrent init race is fine, the
    /// winner inserted the same well known documents
    pub async fn init(&self) -> Result<()> {
        for base in [Node::from(DirDoc::root()), Node::from(DirDoc::trash())] {
            match self.docs.insert(self.ns(), &base).await {
                Ok(_) => {
                    tracing::debug!("created base directory. ns: {} id: {}", self.ns(), base.id());
                }
                Err(StoreError::AlreadyExists(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    pub async fn get_node(&self, id: &str) -> Result<Node> {
        self.docs.get(self.ns(), id)
            .await?
            .ok_or(Error::from(ErrorKind::NotFound))
    }

    pub async fn get_dir(&self, id: &str) -> Result<DirDoc> {
        match self.get_node(id).await? {
            Node::Dir(dir) => Ok(dir),
            Node::File(_) => Err(Error::from(ErrorKind::NotADirectory)),
        }
    }

    pub async fn get_file(&self, id: &str) -> Result<FileDoc> {
        match self.get_node(id).await? {
            Node::File(file) => Ok(file),
            Node::Dir(_) => Err(Error::from(ErrorKind::NotAFile)),
        }
    }

    /// children of a directory, sorted by name for stable listings
    pub async fn list_dir(&self, id: &str) -> Result<Vec<Node>> {
        let dir = self.get_dir(id).await?;

        let mut children = self.docs.children(self.ns(), &dir.id).await?;
        children.sort_by(|a, b| a.basename().cmp(b.basename()));

        Ok(children)
    }

    /// contents of the trash root
    pub async fn list_trash(&self) -> Result<Vec<Node>> {
        self.list_dir(consts::TRASH_DIR_ID).await
    }

    /// id of the active sibling already holding (parent, name), if
    /// any. trashed documents moved out of the slot when they were
    /// reparented under the trash root
    pub(crate) async fn name_check(&self, parent: &str, basename: &str) -> Result<Option<DocId>> {
        let children = self.docs.children(self.ns(), parent).await?;

        Ok(children.into_iter()
            .find(|child| child.basename() == basename)
            .map(|child| child.id().clone()))
    }

    /// whether the document currently lives under the trash subtree
    pub(crate) async fn node_in_trash(&self, node: &Node) -> Result<bool> {
        match node {
            Node::Dir(dir) => Ok(dir.in_trash()),
            Node::File(file) => {
                if file.parent == consts::TRASH_DIR_ID {
                    return Ok(true);
                }

                let parent = self.get_dir(&file.parent).await
                    .map_err(|err| match err.kind_ref() {
                        ErrorKind::NotFound => Error::from(ErrorKind::Orphaned)
                            .context("file parent is missing"),
                        _ => err
                    })?;

                Ok(parent.in_trash())
            }
        }
    }

    /// optimistic concurrency precondition. an absent or empty
    /// expected revision means "write unconditionally"
    pub(crate) fn check_expected_rev(node: &Node, expected: Option<&str>) -> Result<()> {
        let Some(expected) = expected else {
            return Ok(());
        };

        if expected.is_empty() || expected == node.rev() {
            Ok(())
        } else {
            Err(Error::from((
                ErrorKind::Conflict,
                Detail::with_key("If-Match")
            )))
        }
    }

    /// persists a new document and stamps the first revision onto it
    pub(crate) async fn insert_node(&self, node: &mut Node) -> Result<()> {
        match self.docs.insert(self.ns(), node).await {
            Ok(rev) => {
                node.set_rev(rev);
                Ok(())
            }
            // another writer claimed the id; surfaced like a name
            // collision so the caller retries with fresh data
            Err(StoreError::AlreadyExists(_)) => Err(Error::from(ErrorKind::Conflict)),
            Err(err) => Err(err.into()),
        }
    }

    /// compare-and-swap update; the node carries its base revision
    /// and receives the stamped successor
    pub(crate) async fn update_node(&self, node: &mut Node) -> Result<()> {
        match self.docs.update(self.ns(), node).await? {
            CasResult::Ok(rev) => {
                node.set_rev(rev);
                Ok(())
            }
            CasResult::Conflict => Err(Error::from(ErrorKind::Conflict)
                .context("document was modified concurrently")),
        }
    }
}
