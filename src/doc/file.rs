use chrono::{DateTime, Utc};
use nimbus_lib::ids::{self, DocId, RevToken};
use nimbus_lib::tags::TagSet;
use serde::{Serialize, Deserialize};

/// a file's metadata record. `size` and `md5` always describe the
/// blob currently bound through `blob`; the engine never persists a
/// FileDoc referencing unverified content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDoc {
    pub id: DocId,
    /// stamped by the document store on every persisted mutation
    #[serde(default)]
    pub rev: RevToken,
    pub basename: String,
    pub parent: DocId,
    /// parent at the moment the document was trashed
    pub restore_parent: Option<DocId>,
    pub size: u64,
    pub md5: [u8; 16],
    #[serde(with = "super::mime_serde")]
    pub mime: mime::Mime,
    pub class: String,
    pub executable: bool,
    pub tags: TagSet,
    /// content generation uid. the storage key is derived from it so
    /// an overwrite writes a fresh blob instead of touching the one
    /// readers may still be streaming
    pub blob: String,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
}

impl FileDoc {
    /// fresh, unpersisted document with a zeroed content binding. the
    /// content pipeline fills size/md5 and the store stamps the rev
    pub fn create<N, P>(basename: N, parent: P, mime: mime::Mime, tags: TagSet) -> Self
    where
        N: Into<String>,
        P: Into<DocId>,
    {
        let class = mime.type_().as_str().to_owned();

        FileDoc {
            id: ids::create_uid(),
            rev: RevToken::new(),
            basename: basename.into(),
            parent: parent.into(),
            restore_parent: None,
            size: 0,
            md5: [0; 16],
            mime,
            class,
            executable: false,
            tags,
            blob: ids::create_uid(),
            created: Utc::now(),
            updated: None,
        }
    }

    /// storage key of the currently bound blob
    pub fn blob_key(&self) -> String {
        format!("{}/{}", self.id, self.blob)
    }

    pub fn storage_key_for(&self, blob: &str) -> String {
        format!("{}/{}", self.id, blob)
    }

    /// digest derived cache validator for the http boundary
    pub fn etag(&self) -> String {
        use std::fmt::Write;

        let mut rtn = String::with_capacity(self.md5.len() * 2 + 2);
        rtn.push('"');

        for byte in &self.md5 {
            write!(&mut rtn, "{:02x}", byte).unwrap();
        }

        rtn.push('"');
        rtn
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blob_key_includes_doc_and_content_uid() {
        let file = FileDoc::create("a.txt", "parent", mime::TEXT_PLAIN, Default::default());

        assert_eq!(file.blob_key(), format!("{}/{}", file.id, file.blob));
    }

    #[test]
    fn etag_is_quoted_hex() {
        let mut file = FileDoc::create("a.txt", "parent", mime::TEXT_PLAIN, Default::default());
        file.md5 = [0xab; 16];

        assert_eq!(file.etag(), format!("\"{}\"", "ab".repeat(16)));
    }
}
