//! Path resolution.
//!
//! Maps absolute path strings onto the directory tree and back. The
//! parent ids are the source of truth; the denormalized path strings
//! on directories are a cache maintained by the mutation engine.

use std::collections::HashSet;

use crate::consts;
use crate::doc::{Node, dir::join_path};
use crate::error::{Error, ErrorKind, Detail, Result};
use crate::vfs::Vfs;

/// splits an absolute path into validated segments. "/" yields no
/// segments
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let Some(rest) = path.strip_prefix(consts::ROOT_DIR_PATH) else {
        return Err(Error::from((
            ErrorKind::NonAbsolutePath,
            Detail::with_key("path")
        )));
    };

    // a single trailing separator is tolerated, "//" is not
    let rest = match rest.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        Some(_) => return Err(Error::from((
            ErrorKind::IllegalFilename,
            Detail::with_key("path")
        ))),
        None => rest,
    };

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();

    for segment in rest.split('/') {
        if !nimbus_lib::fs::basename_valid(segment) {
            return Err(Error::from((
                ErrorKind::IllegalFilename,
                Detail::with_key("path")
            )));
        }

        segments.push(segment);
    }

    Ok(segments)
}

impl Vfs {
    /// resolves an absolute path to the document chain from the root
    /// to the leaf, the root included
    pub async fn resolve_path(&self, path: &str) -> Result<Vec<Node>> {
        let segments = split_path(path)?;

        let root = self.get_node(consts::ROOT_DIR_ID).await?;
        let mut chain = Vec::with_capacity(segments.len() + 1);
        chain.push(root);

        for segment in segments {
            let current = chain.last().unwrap();

            let parent = match current {
                Node::Dir(dir) => dir,
                Node::File(_) => return Err(Error::from(ErrorKind::NotADirectory)
                    .context(format!("segment {:?} is not the last and resolves through a file", segment))),
            };

            let found = self.name_check(&parent.id, segment).await?
                .ok_or(Error::from(ErrorKind::NotFound))?;

            chain.push(self.get_node(&found).await?);
        }

        Ok(chain)
    }

    /// leaf document at an absolute path
    pub async fn get_by_path(&self, path: &str) -> Result<Node> {
        let mut chain = self.resolve_path(path).await?;

        Ok(chain.pop().unwrap())
    }

    /// recomputes the canonical path of a document by walking its
    /// parent chain to the root. a cycle or missing ancestor means a
    /// mutation escaped its guards; surfaced as `Orphaned`
    pub async fn canonical_path(&self, node: &Node) -> Result<String> {
        let mut segments = vec![node.basename().to_owned()];
        let mut visited: HashSet<String> = HashSet::from([node.id().clone()]);
        let mut current = node.parent().cloned();

        while let Some(parent_id) = current {
            if parent_id == consts::ROOT_DIR_ID {
                break;
            }

            if !visited.insert(parent_id.clone()) {
                return Err(Error::from(ErrorKind::Orphaned)
                    .context(format!("parent cycle through {}", parent_id)));
            }

            let parent = self.docs().get(self.ns(), &parent_id).await?
                .ok_or(Error::from(ErrorKind::Orphaned)
                    .context(format!("missing ancestor {}", parent_id)))?;

            match parent {
                Node::Dir(dir) => {
                    segments.push(dir.basename.clone());
                    current = dir.parent.clone();
                }
                Node::File(_) => return Err(Error::from(ErrorKind::Orphaned)
                    .context("ancestor resolved to a file")),
            }
        }

        let mut rtn = String::from(consts::ROOT_DIR_PATH);

        for segment in segments.iter().rev() {
            rtn = join_path(&rtn, segment);
        }

        Ok(rtn)
    }
}
