//! Directory creation.

use nimbus_lib::tags::{self, TagSet};

use crate::consts;
use crate::doc::{Node, DirDoc};
use crate::error::{Error, ErrorKind, Detail, Result};
use crate::path::split_path;

use super::Vfs;

impl Vfs {
    /// inserts a new directory under an existing active parent
    pub async fn create_dir(&self, parent_id: &str, basename: &str, tags: TagSet) -> Result<DirDoc> {
        if !nimbus_lib::fs::basename_valid(basename) {
            return Err(Error::from((
                ErrorKind::IllegalFilename,
                Detail::with_key("name")
            )));
        }

        if !tags::validate_set(&tags) {
            return Err(Error::from((
                ErrorKind::InvalidTags,
                Detail::with_key("tags")
            )));
        }

        let parent = match self.get_node(parent_id).await {
            Ok(Node::Dir(dir)) => dir,
            Ok(Node::File(_)) => return Err(Error::from(ErrorKind::NotADirectory)),
            Err(err) if err.is_kind(ErrorKind::NotFound) => {
                return Err(Error::from(ErrorKind::ParentDoesNotExist));
            }
            Err(err) => return Err(err),
        };

        if parent.in_trash() {
            return Err(Error::from((
                ErrorKind::FileInTrash,
                "cannot create inside the trash"
            )));
        }

        if self.name_check(&parent.id, basename).await?.is_some() {
            return Err(Error::from((
                ErrorKind::Conflict,
                Detail::with_key("name")
            )));
        }

        let mut node = Node::from(DirDoc::create(basename, &*parent.id, &parent.path, tags));

        self.insert_node(&mut node).await?;

        tracing::debug!("created directory. ns: {} id: {}", self.ns(), node.id());

        let Node::Dir(dir) = node else { unreachable!() };

        Ok(dir)
    }

    /// creates the directory named by an absolute path. every
    /// ancestor must already exist
    pub async fn mkdir(&self, path: &str, tags: TagSet) -> Result<DirDoc> {
        let mut segments = split_path(path)?;

        let Some(leaf) = segments.pop() else {
            // "/" always exists
            return Err(Error::from((
                ErrorKind::Conflict,
                Detail::with_key("path")
            )));
        };

        let mut parent_id = consts::ROOT_DIR_ID.to_owned();

        for segment in segments {
            let found = self.name_check(&parent_id, segment).await?
                .ok_or(Error::from(ErrorKind::ParentDoesNotExist))?;

            match self.get_node(&found).await? {
                Node::Dir(dir) => parent_id = dir.id,
                Node::File(_) => return Err(Error::from(ErrorKind::NotADirectory)),
            }
        }

        self.create_dir(&parent_id, leaf, tags).await
    }

    /// creates the directory named by an absolute path along with any
    /// missing ancestors. existing ancestor directories are reused;
    /// an ancestor that resolves to a file fails. tags apply to the
    /// leaf only.
    ///
    /// a concurrent create of the same ancestor can win the race; the
    /// resulting collision surfaces as `Conflict` and the caller
    /// retries
    pub async fn mkdir_all(&self, path: &str, tags: TagSet) -> Result<DirDoc> {
        let segments = split_path(path)?;

        if segments.is_empty() {
            return Err(Error::from((
                ErrorKind::Conflict,
                Detail::with_key("path")
            )));
        }

        let last = segments.len() - 1;
        let mut parent_id = consts::ROOT_DIR_ID.to_owned();
        let mut leaf: Option<DirDoc> = None;

        for (depth, segment) in segments.into_iter().enumerate() {
            let existing = match self.name_check(&parent_id, segment).await? {
                Some(found) => Some(self.get_node(&found).await?),
                None => None,
            };

            let dir = match existing {
                Some(Node::Dir(dir)) => {
                    if depth == last {
                        // the leaf itself already exists
                        return Err(Error::from((
                            ErrorKind::Conflict,
                            Detail::with_key("name")
                        )));
                    }

                    dir
                }
                Some(Node::File(_)) => return Err(Error::from(ErrorKind::NotADirectory)),
                None => {
                    let dir_tags = if depth == last { tags.clone() } else { TagSet::new() };

                    self.create_dir(&parent_id, segment, dir_tags).await?
                }
            };

            parent_id = dir.id.clone();
            leaf = Some(dir);
        }

        Ok(leaf.unwrap())
    }
}
