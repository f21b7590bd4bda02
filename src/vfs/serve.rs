//! Content serving.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, ErrorKind, Result};
use crate::store::BlobReader;

use super::Vfs;

/// how a served file should be presented by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    /// Content-Disposition header value for the given filename.
    /// non-ascii names get the RFC 5987 encoded form alongside an
    /// ascii fallback
    pub fn header_value(&self, basename: &str) -> String {
        let token = match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        };

        if basename.is_ascii() && !basename.contains(['"', '\\']) {
            format!("{}; filename=\"{}\"", token, basename)
        } else {
            let mut encoded = String::new();

            for byte in basename.as_bytes() {
                match byte {
                    b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                        encoded.push(*byte as char);
                    }
                    _ => {
                        encoded.push_str(&format!("%{:02X}", byte));
                    }
                }
            }

            format!("{}; filename=\"download\"; filename*=UTF-8''{}", token, encoded)
        }
    }
}

/// a readable file body plus the metadata a transport needs to frame
/// it
pub struct Content {
    pub basename: String,
    pub mime: mime::Mime,
    pub size: u64,
    pub etag: String,
    pub disposition: Disposition,
    reader: BlobReader,
}

impl Content {
    /// Content-Disposition header value for this file
    pub fn disposition_header(&self) -> String {
        self.disposition.header_value(&self.basename)
    }

    pub fn into_reader(self) -> BlobReader {
        self.reader
    }

    /// drains the body into the given writer, returning the number of
    /// bytes copied
    pub async fn copy_to<W>(mut self, output: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let copied = tokio::io::copy(&mut self.reader, output).await?;

        output.flush().await?;

        Ok(copied)
    }
}

impl Vfs {
    /// opens a file's content for reading. trashed files stay
    /// readable until purged
    pub async fn serve_content(&self, file_id: &str, disposition: Disposition) -> Result<Content> {
        let file = self.get_file(file_id).await?;

        let reader = self.blobs().open(self.ns(), &file.blob_key()).await?
            .ok_or(Error::from(ErrorKind::NotFound)
                .context(format!("content for {} is missing", file.id)))?;

        let etag = file.etag();

        Ok(Content {
            basename: file.basename,
            mime: file.mime,
            size: file.size,
            etag,
            disposition,
            reader,
        })
    }
}
