use chrono::{DateTime, Utc};
use nimbus_lib::ids::DocId;
use nimbus_lib::tags::TagSet;
use serde::Deserialize;

/// requested partial mutation of a file or directory. never persisted
/// itself; the mutation engine applies it to the current document to
/// produce the next revision. untouched fields keep their stored
/// values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocPatch {
    pub basename: Option<String>,
    pub parent: Option<DocId>,
    pub tags: Option<TagSet>,
    pub executable: Option<bool>,
    pub updated: Option<DateTime<Utc>>,
}

impl DocPatch {
    pub fn has_work(&self) -> bool {
        self.basename.is_some() ||
            self.parent.is_some() ||
            self.tags.is_some() ||
            self.executable.is_some() ||
            self.updated.is_some()
    }

    pub fn rename<N>(basename: N) -> Self
    where
        N: Into<String>
    {
        DocPatch {
            basename: Some(basename.into()),
            ..Default::default()
        }
    }

    pub fn reparent<P>(parent: P) -> Self
    where
        P: Into<DocId>
    {
        DocPatch {
            parent: Some(parent.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn has_work() {
        assert!(!DocPatch::default().has_work());
        assert!(DocPatch::rename("new").has_work());
        assert!(DocPatch::reparent("dir").has_work());
    }
}
