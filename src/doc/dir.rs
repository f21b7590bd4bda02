use chrono::{DateTime, Utc};
use nimbus_lib::ids::{self, DocId, RevToken};
use nimbus_lib::tags::TagSet;
use serde::{Serialize, Deserialize};

use crate::consts;

/// a directory's metadata record. `path` is denormalized from the
/// parent chain and recomputed whenever an ancestor is renamed or
/// moved; the parent ids remain the source of truth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirDoc {
    pub id: DocId,
    #[serde(default)]
    pub rev: RevToken,
    pub basename: String,
    /// `None` only for the namespace root
    pub parent: Option<DocId>,
    /// parent at the moment the document was trashed
    pub restore_parent: Option<DocId>,
    pub path: String,
    pub tags: TagSet,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
}

impl DirDoc {
    pub fn create<N, P>(basename: N, parent: P, parent_path: &str, tags: TagSet) -> Self
    where
        N: Into<String>,
        P: Into<DocId>,
    {
        let basename = basename.into();
        let path = join_path(parent_path, &basename);

        DirDoc {
            id: ids::create_uid(),
            rev: RevToken::new(),
            basename,
            parent: Some(parent.into()),
            restore_parent: None,
            path,
            tags,
            created: Utc::now(),
            updated: None,
        }
    }

    /// the fixed namespace anchor
    pub fn root() -> Self {
        DirDoc {
            id: consts::ROOT_DIR_ID.to_owned(),
            rev: RevToken::new(),
            basename: String::new(),
            parent: None,
            restore_parent: None,
            path: consts::ROOT_DIR_PATH.to_owned(),
            tags: TagSet::new(),
            created: Utc::now(),
            updated: None,
        }
    }

    /// the reserved soft delete holding area
    pub fn trash() -> Self {
        DirDoc {
            id: consts::TRASH_DIR_ID.to_owned(),
            rev: RevToken::new(),
            basename: consts::TRASH_DIR_NAME.to_owned(),
            parent: Some(consts::ROOT_DIR_ID.to_owned()),
            restore_parent: None,
            path: consts::TRASH_DIR_PATH.to_owned(),
            tags: TagSet::new(),
            created: Utc::now(),
            updated: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == consts::ROOT_DIR_ID
    }

    pub fn is_trash_root(&self) -> bool {
        self.id == consts::TRASH_DIR_ID
    }

    /// true when the denormalized path places this directory inside
    /// the trash subtree
    pub fn in_trash(&self) -> bool {
        self.is_trash_root() ||
            self.path.starts_with(&format!("{}/", consts::TRASH_DIR_PATH))
    }
}

/// joins a parent path string and a leaf name without doubling the
/// root's trailing separator
pub fn join_path(parent_path: &str, basename: &str) -> String {
    if parent_path == consts::ROOT_DIR_PATH {
        format!("/{}", basename)
    } else {
        format!("{}/{}", parent_path, basename)
    }
}
