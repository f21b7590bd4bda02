//! Trash lifecycle.
//!
//! Trashing reparents a document under the trash root while keeping
//! its previous parent so it can be restored later. The (parent, name)
//! slot it held becomes free for new documents. Purging removes
//! content before metadata so a failed purge can always be retried.

use chrono::Utc;

use crate::consts;
use crate::doc::{Node, dir::join_path};
use crate::error::{Error, ErrorKind, Detail, Result};

use super::Vfs;

impl Vfs {
    /// moves a document into the trash. the document keeps its id and
    /// remembers its previous parent for [`restore`](Vfs::restore)
    pub async fn trash(&self, id: &str, expected_rev: Option<&str>) -> Result<Node> {
        let mut node = self.get_node(id).await?;

        if id == consts::ROOT_DIR_ID || id == consts::TRASH_DIR_ID {
            return Err(Error::from(ErrorKind::ForbiddenDocMove)
                .context("the root and trash directories cannot be trashed"));
        }

        Vfs::check_expected_rev(&node, expected_rev)?;

        if self.node_in_trash(&node).await? {
            return Err(Error::from(ErrorKind::FileInTrash)
                .context("document is already in the trash"));
        }

        let updated = Utc::now();

        match &mut node {
            Node::Dir(dir) => {
                dir.restore_parent = dir.parent.clone()
                    .or_else(|| Some(consts::ROOT_DIR_ID.to_owned()));
                dir.parent = Some(consts::TRASH_DIR_ID.to_owned());
                dir.path = join_path(consts::TRASH_DIR_PATH, &dir.basename);
                dir.updated = Some(updated);
            }
            Node::File(file) => {
                file.restore_parent = Some(file.parent.clone());
                file.parent = consts::TRASH_DIR_ID.to_owned();
                file.updated = Some(updated);
            }
        }

        self.update_node(&mut node).await?;

        if let Node::Dir(dir) = &node {
            self.refresh_subtree_paths(dir).await?;
        }

        tracing::debug!("trashed document. ns: {} id: {}", self.ns(), node.id());

        Ok(node)
    }

    /// moves a trashed document back under its remembered parent. the
    /// id is kept; the restore fails if the slot was taken or the
    /// parent itself went away or got trashed
    pub async fn restore(&self, id: &str, expected_rev: Option<&str>) -> Result<Node> {
        let mut node = self.get_node(id).await?;

        Vfs::check_expected_rev(&node, expected_rev)?;

        if !self.node_in_trash(&node).await? {
            return Err(Error::from(ErrorKind::FileInTrash)
                .context("document is not in the trash"));
        }

        let Some(restore_parent) = node.restore_parent().cloned() else {
            // trashed along with an ancestor; restore the ancestor
            return Err(Error::from(ErrorKind::FileInTrash)
                .context("document was trashed through an ancestor"));
        };

        let parent = match self.get_node(&restore_parent).await {
            Ok(Node::Dir(dir)) => dir,
            Ok(Node::File(_)) => return Err(Error::from(ErrorKind::NotADirectory)),
            Err(err) if err.is_kind(ErrorKind::NotFound) => {
                return Err(Error::from(ErrorKind::ParentDoesNotExist));
            }
            Err(err) => return Err(err),
        };

        if parent.in_trash() {
            return Err(Error::from(ErrorKind::ParentDoesNotExist)
                .context("previous parent is itself in the trash"));
        }

        if self.name_check(&parent.id, node.basename()).await?.is_some() {
            return Err(Error::from((
                ErrorKind::Conflict,
                Detail::with_key("name")
            )));
        }

        let updated = Utc::now();

        match &mut node {
            Node::Dir(dir) => {
                dir.parent = Some(parent.id.clone());
                dir.restore_parent = None;
                dir.path = join_path(&parent.path, &dir.basename);
                dir.updated = Some(updated);
            }
            Node::File(file) => {
                file.parent = parent.id.clone();
                file.restore_parent = None;
                file.updated = Some(updated);
            }
        }

        self.update_node(&mut node).await?;

        if let Node::Dir(dir) = &node {
            self.refresh_subtree_paths(dir).await?;
        }

        tracing::debug!("restored document. ns: {} id: {}", self.ns(), node.id());

        Ok(node)
    }

    /// permanently removes a document. trashed subtrees are removed
    /// whole; an active document must be an empty directory. blobs go
    /// before metadata, so a partial failure leaves documents whose
    /// content is already gone and a retry finishes the job
    pub async fn purge(&self, id: &str) -> Result<()> {
        let node = self.get_node(id).await?;

        if id == consts::ROOT_DIR_ID || id == consts::TRASH_DIR_ID {
            return Err(Error::from(ErrorKind::ForbiddenDocMove)
                .context("the root and trash directories cannot be purged"));
        }

        if !self.node_in_trash(&node).await? {
            match &node {
                Node::File(_) => {
                    return Err(Error::from(ErrorKind::FileInTrash)
                        .context("active files must be trashed before purging"));
                }
                Node::Dir(dir) => {
                    if !self.docs().children(self.ns(), &dir.id).await?.is_empty() {
                        return Err(Error::from(ErrorKind::DirNotEmpty));
                    }
                }
            }
        }

        self.purge_node(node).await
    }

    /// post-order removal so directory metadata only goes once every
    /// descendant is gone
    async fn purge_node(&self, node: Node) -> Result<()> {
        let mut ordered = Vec::new();
        let mut stack = vec![node];

        // ancestors land before their descendants
        while let Some(next) = stack.pop() {
            if let Node::Dir(dir) = &next {
                for child in self.docs().children(self.ns(), &dir.id).await? {
                    stack.push(child);
                }
            }

            ordered.push(next);
        }

        for next in ordered.into_iter().rev() {
            match next {
                Node::File(file) => {
                    // a blob already missing from an earlier attempt
                    // is fine, any other failure keeps the metadata so
                    // the purge can be retried
                    self.blobs().remove(self.ns(), &file.blob_key()).await
                        .map_err(|err| Error::from(ErrorKind::Internal)
                            .context(format!("failed to remove blob for {}", file.id))
                            .source(err))?;

                    self.docs().remove(self.ns(), &file.id).await?;

                    tracing::debug!("purged file. ns: {} id: {}", self.ns(), file.id);
                }
                Node::Dir(dir) => {
                    self.docs().remove(self.ns(), &dir.id).await?;

                    tracing::debug!("purged directory. ns: {} id: {}", self.ns(), dir.id);
                }
            }
        }

        Ok(())
    }
}
