use chrono::{DateTime, Utc};
use nimbus_lib::ids::{DocId, RevToken};
use nimbus_lib::tags::TagSet;
use serde::{Serialize, Deserialize};

pub mod file;
pub use file::FileDoc;

pub mod dir;
pub use dir::DirDoc;

pub mod patch;
pub use patch::DocPatch;

/// a document in the namespace. files and directories share the move,
/// patch and trash pipeline and are dispatched by exhaustive matching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    #[serde(rename = "directory")]
    Dir(DirDoc),
    #[serde(rename = "file")]
    File(FileDoc),
}

impl Node {
    pub fn id(&self) -> &DocId {
        match self {
            Self::Dir(dir) => &dir.id,
            Self::File(file) => &file.id,
        }
    }

    pub fn rev(&self) -> &RevToken {
        match self {
            Self::Dir(dir) => &dir.rev,
            Self::File(file) => &file.rev,
        }
    }

    pub fn set_rev(&mut self, rev: RevToken) {
        match self {
            Self::Dir(dir) => dir.rev = rev,
            Self::File(file) => file.rev = rev,
        }
    }

    /// parent directory id. `None` only for the namespace root
    pub fn parent(&self) -> Option<&DocId> {
        match self {
            Self::Dir(dir) => dir.parent.as_ref(),
            Self::File(file) => Some(&file.parent),
        }
    }

    pub fn restore_parent(&self) -> Option<&DocId> {
        match self {
            Self::Dir(dir) => dir.restore_parent.as_ref(),
            Self::File(file) => file.restore_parent.as_ref(),
        }
    }

    pub fn basename(&self) -> &str {
        match self {
            Self::Dir(dir) => &dir.basename,
            Self::File(file) => &file.basename,
        }
    }

    pub fn tags(&self) -> &TagSet {
        match self {
            Self::Dir(dir) => &dir.tags,
            Self::File(file) => &file.tags,
        }
    }

    pub fn set_tags(&mut self, tags: TagSet) -> TagSet {
        match self {
            Self::Dir(dir) => std::mem::replace(&mut dir.tags, tags),
            Self::File(file) => std::mem::replace(&mut file.tags, tags),
        }
    }

    pub fn created(&self) -> &DateTime<Utc> {
        match self {
            Self::Dir(dir) => &dir.created,
            Self::File(file) => &file.created,
        }
    }

    pub fn updated(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Dir(dir) => dir.updated.as_ref(),
            Self::File(file) => file.updated.as_ref(),
        }
    }

    pub fn set_updated(&mut self, at: DateTime<Utc>) {
        match self {
            Self::Dir(dir) => dir.updated = Some(at),
            Self::File(file) => file.updated = Some(at),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir(_))
    }

    pub fn as_dir(&self) -> Option<&DirDoc> {
        match self {
            Self::Dir(dir) => Some(dir),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileDoc> {
        match self {
            Self::File(file) => Some(file),
            Self::Dir(_) => None,
        }
    }
}

impl From<DirDoc> for Node {
    fn from(dir: DirDoc) -> Self {
        Node::Dir(dir)
    }
}

impl From<FileDoc> for Node {
    fn from(file: FileDoc) -> Self {
        Node::File(file)
    }
}

impl TryFrom<Node> for FileDoc {
    type Error = Node;

    fn try_from(node: Node) -> std::result::Result<Self, Self::Error> {
        match node {
            Node::File(file) => Ok(file),
            _ => Err(node)
        }
    }
}

impl TryFrom<Node> for DirDoc {
    type Error = Node;

    fn try_from(node: Node) -> std::result::Result<Self, Self::Error> {
        match node {
            Node::Dir(dir) => Ok(dir),
            _ => Err(node)
        }
    }
}

/// parses a content type into a mime and the coarse class derived
/// from its top level type. absent or unparseable values fall back to
/// application/octet-stream
pub fn extract_mime_and_class(content_type: Option<&str>) -> (mime::Mime, String) {
    let mime = content_type
        .and_then(|given| given.parse::<mime::Mime>().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);
    let class = mime.type_().as_str().to_owned();

    (mime, class)
}

pub(crate) mod mime_serde {
    use serde::{Serializer, Deserializer, Deserialize};
    use serde::de::Error as _;

    pub fn serialize<S>(mime: &mime::Mime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer
    {
        serializer.serialize_str(mime.as_ref())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<mime::Mime, D::Error>
    where
        D: Deserializer<'de>
    {
        let given = String::deserialize(deserializer)?;

        given.parse().map_err(D::Error::custom)
    }
}
