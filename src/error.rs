use serde::{Serialize, Deserialize};
use strum::AsRefStr as StrumAsRefStr;

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// error taxonomy surfaced to the caller. every validation or
/// precondition failure maps to exactly one kind so an outer boundary
/// can translate it without inspecting message strings
#[derive(
    Debug, Clone, PartialEq, Eq,
    StrumAsRefStr,
    Serialize, Deserialize
)]
pub enum ErrorKind {
    /// no such document, or the blob a document references is gone
    NotFound,
    /// the referenced parent directory does not exist
    ParentDoesNotExist,
    /// a non terminal path segment resolved to a file
    NotADirectory,
    /// the operation requires a file but got a directory
    NotAFile,
    /// optimistic concurrency precondition failed, or an active
    /// sibling already holds the (name, parent) slot
    Conflict,
    /// malformed name or path segment
    IllegalFilename,
    /// the given path is relative or empty
    NonAbsolutePath,
    /// a parent chain walk hit a cycle or a missing ancestor
    Orphaned,
    /// cycle creating move, or a move across the trash boundary
    ForbiddenDocMove,
    /// direct destroy of a directory that still has children
    DirNotEmpty,
    /// actual streamed length differs from the declared length
    ContentLengthMismatch,
    /// actual content digest differs from the declared digest
    InvalidHash,
    /// operation is not valid on a trashed document
    FileInTrash,
    InvalidTags,
    /// storage layer failure. never used for validation outcomes
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_ref(), f)
    }
}

/// names the field an error is about, e.g. "name" or "Content-MD5"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Detail {
    Keys(Vec<String>),
}

impl Detail {
    pub fn with_key(key: impl Into<String>) -> Self {
        Detail::Keys(vec![key.into()])
    }
}

impl std::fmt::Display for Detail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detail::Keys(list) => {
                let mut iter = list.iter();

                if let Some(first) = iter.next() {
                    write!(f, "{}", first)?;

                    for key in iter {
                        write!(f, ",{}", key)?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    detail: Option<Detail>,
    cxt: Option<String>,
    src: Option<BoxDynError>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new() -> Self {
        Error {
            kind: ErrorKind::Internal,
            detail: None,
            cxt: None,
            src: None,
        }
    }

    pub fn kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn detail(mut self, detail: Detail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn context<C>(mut self, cxt: C) -> Self
    where
        C: Into<String>
    {
        self.cxt = Some(cxt.into());
        self
    }

    pub fn source<S>(mut self, src: S) -> Self
    where
        S: Into<BoxDynError>
    {
        self.src = Some(src.into());
        self
    }

    pub fn kind_ref(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn detail_ref(&self) -> Option<&Detail> {
        self.detail.as_ref()
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl Default for Error {
    fn default() -> Self {
        Error::new()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(detail) = &self.detail {
            write!(f, "[{}]", detail)?;
        }

        if let Some(cxt) = &self.cxt {
            write!(f, ": {}", cxt)?;
        }

        if let Some(src) = &self.src {
            write!(f, "\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.src.as_ref().map(|v| & **v as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new()
            .kind(kind)
    }
}

impl From<(ErrorKind, Detail)> for Error {
    fn from((kind, detail): (ErrorKind, Detail)) -> Self {
        Error::new()
            .kind(kind)
            .detail(detail)
    }
}

impl From<(ErrorKind, &str)> for Error {
    fn from((kind, cxt): (ErrorKind, &str)) -> Self {
        Error::new()
            .kind(kind)
            .context(cxt)
    }
}

macro_rules! simple_from {
    ($e:path) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .source(err)
            }
        }
    };
    ($e:path, $k:expr) => {
        impl From<$e> for Error {
            fn from(err: $e) -> Self {
                Error::new()
                    .kind($k)
                    .source(err)
            }
        }
    };
}

simple_from!(std::io::Error);
simple_from!(serde_json::Error);
simple_from!(crate::store::StoreError);

simple_from!(
    mime::FromStrError,
    ErrorKind::IllegalFilename
);

// ----------------------------------------------------------------------------

pub trait Context<T, E> {
    fn context<C>(self, cxt: C) -> Result<T>
    where
        C: Into<String>;

    fn kind(self, kind: ErrorKind) -> Result<T>;

    fn kind_context<C>(self, kind: ErrorKind, cxt: C) -> Result<T>
    where
        C: Into<String>;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<BoxDynError>
{
    fn context<C>(self, cxt: C) -> Result<T>
    where
        C: Into<String>
    {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Error::new()
                .context(cxt)
                .source(err))
        }
    }

    fn kind(self, kind: ErrorKind) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Error::new()
                .kind(kind)
                .source(err))
        }
    }

    fn kind_context<C>(self, kind: ErrorKind, cxt: C) -> Result<T>
    where
        C: Into<String>
    {
        match self {
            Ok(v) => Ok(v),
            Err(err) => Err(Error::new()
                .kind(kind)
                .context(cxt)
                .source(err))
        }
    }
}

impl<T> Context<T, ()> for std::option::Option<T> {
    fn context<C>(self, cxt: C) -> Result<T>
    where
        C: Into<String>
    {
        match self {
            Some(v) => Ok(v),
            None => Err(Error::new()
                .context(cxt))
        }
    }

    fn kind(self, kind: ErrorKind) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(Error::new()
                .kind(kind))
        }
    }

    fn kind_context<C>(self, kind: ErrorKind, cxt: C) -> Result<T>
    where
        C: Into<String>
    {
        match self {
            Some(v) => Ok(v),
            None => Err(Error::new()
                .kind(kind)
                .context(cxt))
        }
    }
}
