//! Content pipeline.
//!
//! Streams uploaded bytes into the blob store while accumulating the
//! actual length and MD5 digest, verifies them against the declared
//! values, and only then lets the metadata document reference the
//! blob. The ordering discipline is fixed: write and verify the blob
//! first (cheap to discard), commit metadata second (authoritative),
//! delete a superseded blob last.

use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use md5::{Md5, Digest};
use nimbus_lib::ids;
use nimbus_lib::tags::{self, TagSet};

use crate::consts;
use crate::doc::{Node, FileDoc};
use crate::error::{Error, ErrorKind, Detail, Result};
use crate::store::BlobWriter;

use super::Vfs;

/// request to create a file. declared size/md5 are verified against
/// the streamed bytes; `size == -1` means the length is discovered
/// from the stream
#[derive(Debug, Clone)]
pub struct NewFile {
    pub parent: String,
    pub basename: String,
    pub tags: TagSet,
    pub size: i64,
    pub md5: Option<[u8; 16]>,
    pub mime: mime::Mime,
    pub executable: bool,
}

impl NewFile {
    pub fn new<P, N>(parent: P, basename: N) -> Self
    where
        P: Into<String>,
        N: Into<String>,
    {
        NewFile {
            parent: parent.into(),
            basename: basename.into(),
            tags: TagSet::new(),
            size: consts::SIZE_UNKNOWN,
            md5: None,
            mime: mime::APPLICATION_OCTET_STREAM,
            executable: false,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    pub fn with_md5(mut self, md5: [u8; 16]) -> Self {
        self.md5 = Some(md5);
        self
    }

    pub fn with_mime(mut self, mime: mime::Mime) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }
}

/// request to overwrite a file's content. `None` fields carry over
/// from the prior document
#[derive(Debug, Clone)]
pub struct Overwrite {
    pub size: i64,
    pub md5: Option<[u8; 16]>,
    pub mime: Option<mime::Mime>,
    pub executable: Option<bool>,
}

impl Overwrite {
    pub fn new() -> Self {
        Overwrite {
            size: consts::SIZE_UNKNOWN,
            md5: None,
            mime: None,
            executable: None,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    pub fn with_md5(mut self, md5: [u8; 16]) -> Self {
        self.md5 = Some(md5);
        self
    }

    pub fn with_mime(mut self, mime: mime::Mime) -> Self {
        self.mime = Some(mime);
        self
    }
}

impl Vfs {
    /// creates a file from a byte stream. the blob is written and
    /// verified before the metadata document exists; any failure
    /// discards the blob and leaves no document behind
    pub async fn create_file<S>(&self, req: NewFile, stream: S) -> Result<FileDoc>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        if !nimbus_lib::fs::basename_valid(&req.basename) {
            return Err(Error::from((
                ErrorKind::IllegalFilename,
                Detail::with_key("name")
            )));
        }

        if !tags::validate_set(&req.tags) {
            return Err(Error::from((
                ErrorKind::InvalidTags,
                Detail::with_key("tags")
            )));
        }

        let parent = match self.get_node(&req.parent).await {
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

        if self.name_check(&parent.id, &req.basename).await?.is_some() {
            return Err(Error::from((
                ErrorKind::Conflict,
                Detail::with_key("name")
            )));
        }

        let mut file = FileDoc::create(&*req.basename, &*parent.id, req.mime, req.tags);
        file.executable = req.executable;

        // the blob is keyed by the freshly allocated identity before
        // the metadata document exists
        let writer = self.blobs().create(self.ns(), &file.blob_key()).await?;

        let (size, md5) = self.write_verified(writer, stream, req.size, req.md5).await?;

        file.size = size;
        file.md5 = md5;

        let mut node = Node::from(file);

        if let Err(err) = self.insert_node(&mut node).await {
            // metadata lost the race; the verified blob must not
            // outlive it
            self.discard_blob(&blob_key_of(&node)).await;

            return Err(err);
        }

        tracing::debug!("created file. ns: {} id: {} size: {}", self.ns(), node.id(), size);

        let Node::File(file) = node else { unreachable!() };

        Ok(file)
    }

    /// replaces a file's content. a new blob is written and verified
    /// so a failed upload never corrupts previously served content;
    /// the old blob is removed only after the metadata commit
    pub async fn overwrite<S>(
        &self,
        file_id: &str,
        expected_rev: Option<&str>,
        req: Overwrite,
        stream: S,
    ) -> Result<FileDoc>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        let current = self.get_file(file_id).await?;

        let node = Node::from(current.clone());

        if self.node_in_trash(&node).await? {
            return Err(Error::from(ErrorKind::FileInTrash));
        }

        // rejected before any stream byte is consumed
        Vfs::check_expected_rev(&node, expected_rev)?;

        let old_key = current.blob_key();
        let next_blob = ids::create_uid();
        let next_key = current.storage_key_for(&next_blob);

        let writer = self.blobs().create(self.ns(), &next_key).await?;

        let (size, md5) = self.write_verified(writer, stream, req.size, req.md5).await?;

        let mut file = current;
        file.size = size;
        file.md5 = md5;
        file.blob = next_blob;
        file.updated = Some(Utc::now());

        if let Some(mime) = req.mime {
            file.class = mime.type_().as_str().to_owned();
            file.mime = mime;
        }

        if let Some(executable) = req.executable {
            file.executable = executable;
        }

        let mut node = Node::from(file);

        if let Err(err) = self.update_node(&mut node).await {
            // concurrent writer won; the new blob is unreferenced
            self.discard_blob(&next_key).await;

            return Err(err);
        }

        // the superseded blob goes last. failure here leaks an
        // unreferenced blob, which offline garbage collection may
        // reclaim; it never corrupts the namespace
        if let Err(err) = self.blobs().remove(self.ns(), &old_key).await {
            tracing::warn!("failed to remove superseded blob. ns: {} key: {} {}", self.ns(), old_key, err);
        }

        let Node::File(file) = node else { unreachable!() };

        Ok(file)
    }

    /// streams the body into the writer, computing the actual length
    /// and digest, then verifies them against the declared values.
    /// every failure path aborts the writer so nothing is published
    async fn write_verified<S>(
        &self,
        mut writer: Box<dyn BlobWriter>,
        mut stream: S,
        declared_size: i64,
        declared_md5: Option<[u8; 16]>,
    ) -> Result<(u64, [u8; 16])>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin,
    {
        let mut written: u64 = 0;
        let mut hasher = Md5::new();

        while let Some(result) = stream.next().await {
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(err) => {
                    // client disconnects land here and get the same
                    // discard treatment as a verification failure
                    self.abort_writer(writer).await;

                    return Err(Error::from(err));
                }
            };

            hasher.update(&bytes);

            if let Err(err) = writer.write_chunk(&bytes).await {
                self.abort_writer(writer).await;

                return Err(err.into());
            }

            written += bytes.len() as u64;
        }

        let md5: [u8; 16] = hasher.finalize().into();

        if declared_size != consts::SIZE_UNKNOWN && declared_size != written as i64 {
            self.abort_writer(writer).await;

            return Err(Error::from((
                ErrorKind::ContentLengthMismatch,
                Detail::with_key("Content-Length")
            )));
        }

        if let Some(declared) = declared_md5 {
            if declared != md5 {
                self.abort_writer(writer).await;

                return Err(Error::from((
                    ErrorKind::InvalidHash,
                    Detail::with_key("Content-MD5")
                )));
            }
        }

        writer.commit().await?;

        Ok((written, md5))
    }

    async fn abort_writer(&self, writer: Box<dyn BlobWriter>) {
        if let Err(err) = writer.abort().await {
            tracing::warn!("failed to abort blob write. ns: {} {}", self.ns(), err);
        }
    }

    async fn discard_blob(&self, key: &str) {
        if let Err(err) = self.blobs().remove(self.ns(), key).await {
            tracing::warn!("failed to remove blob. ns: {} key: {} {}", self.ns(), key, err);
        }
    }
}

fn blob_key_of(node: &Node) -> String {
    match node {
        Node::File(file) => file.blob_key(),
        Node::Dir(_) => unreachable!("directories carry no blob"),
    }
}

/// decodes a Content-MD5 header value. 16 bytes of base64 need 22
/// characters plus up to two characters of padding; anything outside
/// those bounds is rejected before decoding
pub fn parse_content_md5(given: &str) -> Result<[u8; 16]> {
    if given.len() < 22 || given.len() > 24 {
        return Err(Error::from((
            ErrorKind::InvalidHash,
            Detail::with_key("Content-MD5")
        )));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(given)
        .map_err(|err| Error::from((
            ErrorKind::InvalidHash,
            Detail::with_key("Content-MD5")
        )).source(err))?;

    decoded.try_into()
        .map_err(|_| Error::from((
            ErrorKind::InvalidHash,
            Detail::with_key("Content-MD5")
        )))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_md5_decoding() {
        // md5("hello world") = 5eb63bbbe01eeed093cb22bb8f5acdc3
        let encoded = "XrY7u+Ae7tCTyyK7j1rNww==";

        let decoded = parse_content_md5(encoded).unwrap();

        assert_eq!(decoded, [
            0x5e, 0xb6, 0x3b, 0xbb, 0xe0, 0x1e, 0xee, 0xd0,
            0x93, 0xcb, 0x22, 0xbb, 0x8f, 0x5a, 0xcd, 0xc3,
        ]);
    }

    #[test]
    fn content_md5_rejects_bad_input() {
        let invalid = [
            "",
            "tooshort",
            "XrY7u+Ae7tCTyyK7j1rNww==XXXX",
            "!!!!!!!!!!!!!!!!!!!!!!",
        ];

        for given in invalid {
            let err = parse_content_md5(given).unwrap_err();

            assert!(err.is_kind(ErrorKind::InvalidHash), "input {:?} gave {}", given, err);
        }
    }
}
