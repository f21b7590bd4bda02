//! Metadata patches, renames and moves.

use chrono::Utc;
use nimbus_lib::tags;

use crate::consts;
use crate::doc::{Node, DirDoc, DocPatch, dir::join_path};
use crate::error::{Error, ErrorKind, Detail, Result};

use super::Vfs;

impl Vfs {
    /// applies a partial mutation to a file or directory, producing a
    /// new revision. untouched fields keep their stored values
    pub async fn patch(&self, id: &str, expected_rev: Option<&str>, patch: DocPatch) -> Result<Node> {
        let mut node = self.get_node(id).await?;

        if is_reserved(id) {
            return Err(Error::from(ErrorKind::ForbiddenDocMove)
                .context("the root and trash directories cannot be modified"));
        }

        Vfs::check_expected_rev(&node, expected_rev)?;

        if !patch.has_work() {
            return Ok(node);
        }

        if self.node_in_trash(&node).await? {
            return Err(Error::from(ErrorKind::FileInTrash));
        }

        if let Some(tags) = &patch.tags {
            if !tags::validate_set(tags) {
                return Err(Error::from((
                    ErrorKind::InvalidTags,
                    Detail::with_key("tags")
                )));
            }
        }

        let current_parent = node.parent()
            .cloned()
            .unwrap_or_else(|| consts::ROOT_DIR_ID.to_owned());

        let next_parent_id = patch.parent.clone().unwrap_or(current_parent.clone());
        let next_basename = match &patch.basename {
            Some(given) => {
                if !nimbus_lib::fs::basename_valid(given) {
                    return Err(Error::from((
                        ErrorKind::IllegalFilename,
                        Detail::with_key("name")
                    )));
                }

                given.clone()
            }
            None => node.basename().to_owned(),
        };

        let reparenting = next_parent_id != current_parent;
        let renaming = next_basename != node.basename();

        // a retry of a rename/move whose descendant refresh died
        // midway arrives with the requested values already stored, so
        // the refresh keys off the request, not the delta
        let path_touched = patch.basename.is_some() || patch.parent.is_some();

        let next_parent = if reparenting {
            let dest = match self.get_node(&next_parent_id).await {
                Ok(Node::Dir(dir)) => dir,
                Ok(Node::File(_)) => return Err(Error::from(ErrorKind::NotADirectory)),
                Err(err) if err.is_kind(ErrorKind::NotFound) => {
                    return Err(Error::from(ErrorKind::ParentDoesNotExist));
                }
                Err(err) => return Err(err),
            };

            // trash transitions are a distinct path
            if dest.in_trash() {
                return Err(Error::from(ErrorKind::ForbiddenDocMove)
                    .context("cannot move into the trash, use trash()"));
            }

            if node.is_dir() {
                self.assert_not_descendant(node.id(), &dest).await?;
            }

            Some(dest)
        } else {
            None
        };

        if reparenting || renaming {
            if let Some(holder) = self.name_check(&next_parent_id, &next_basename).await? {
                if holder != *node.id() {
                    return Err(Error::from((
                        ErrorKind::Conflict,
                        Detail::with_key("name")
                    )));
                }
            }
        }

        let updated = patch.updated.unwrap_or_else(Utc::now);

        match &mut node {
            Node::Dir(dir) => {
                dir.basename = next_basename;

                if let Some(dest) = &next_parent {
                    dir.parent = Some(dest.id.clone());
                }

                let parent_path = match &next_parent {
                    Some(dest) => dest.path.clone(),
                    None => self.get_dir(&current_parent).await?.path,
                };

                dir.path = join_path(&parent_path, &dir.basename);
                dir.updated = Some(updated);

                if let Some(tags) = patch.tags {
                    dir.tags = tags;
                }
            }
            Node::File(file) => {
                file.basename = next_basename;

                if let Some(dest) = &next_parent {
                    file.parent = dest.id.clone();
                }

                if let Some(executable) = patch.executable {
                    file.executable = executable;
                }

                file.updated = Some(updated);

                if let Some(tags) = patch.tags {
                    file.tags = tags;
                }
            }
        }

        self.update_node(&mut node).await?;

        // the denormalized paths below a moved or renamed directory
        // are stale until recomputed
        if let Node::Dir(dir) = &node {
            if path_touched {
                self.refresh_subtree_paths(dir).await?;
            }
        }

        tracing::debug!("patched document. ns: {} id: {}", self.ns(), node.id());

        Ok(node)
    }

    /// walks the destination's ancestor chain back to the root and
    /// rejects the move if the source appears in it
    pub(crate) async fn assert_not_descendant(&self, source_id: &str, dest: &DirDoc) -> Result<()> {
        use std::collections::HashSet;

        if dest.id == source_id {
            return Err(Error::from(ErrorKind::ForbiddenDocMove)
                .context("cannot move a directory into itself"));
        }

        let mut visited: HashSet<String> = HashSet::from([dest.id.clone()]);
        let mut current = dest.parent.clone();

        while let Some(parent_id) = current {
            if parent_id == source_id {
                return Err(Error::from(ErrorKind::ForbiddenDocMove)
                    .context("cannot move a directory into its own descendant"));
            }

            if parent_id == consts::ROOT_DIR_ID {
                break;
            }

            if !visited.insert(parent_id.clone()) {
                return Err(Error::from(ErrorKind::Orphaned)
                    .context(format!("parent cycle through {}", parent_id)));
            }

            current = self.get_dir(&parent_id).await
                .map_err(|err| match err.kind_ref() {
                    ErrorKind::NotFound => Error::from(ErrorKind::Orphaned)
                        .context(format!("missing ancestor {}", parent_id)),
                    _ => err
                })?
                .parent;
        }

        Ok(())
    }

    /// eagerly recomputes the denormalized path of every descendant
    /// directory after a subtree root moved
    pub(crate) async fn refresh_subtree_paths(&self, dir: &DirDoc) -> Result<()> {
        let mut stack = vec![dir.clone()];

        while let Some(parent) = stack.pop() {
            for child in self.docs().children(self.ns(), &parent.id).await? {
                let Node::Dir(mut child_dir) = child else {
                    continue;
                };

                let next = join_path(&parent.path, &child_dir.basename);

                if next != child_dir.path {
                    child_dir.path = next;

                    let mut node = Node::from(child_dir.clone());
                    self.update_node(&mut node).await?;
                }

                stack.push(child_dir);
            }
        }

        Ok(())
    }
}

fn is_reserved(id: &str) -> bool {
    id == consts::ROOT_DIR_ID || id == consts::TRASH_DIR_ID
}
