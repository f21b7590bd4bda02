use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use nimbus_lib::ids::RevToken;

use crate::doc::Node;
use super::{StoreError, next_rev};
use super::docs::{DocStore, CasResult};
use super::blob::{BlobStore, BlobWriter, BlobReader};

type Key = (String, String);

fn key(ns: &str, id: &str) -> Key {
    (ns.to_owned(), id.to_owned())
}

/// in-memory document store. the namespace is part of every key so
/// tenants can never observe each other's documents
#[derive(Default)]
pub struct MemoryDocStore {
    docs: DashMap<Key, Node>,
}

impl MemoryDocStore {
    pub fn new() -> Self {
        Default::default()
    }
}

#[async_trait]
impl DocStore for MemoryDocStore {
    async fn get(&self, ns: &str, id: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.docs.get(&key(ns, id)).map(|found| found.clone()))
    }

    async fn insert(&self, ns: &str, node: &Node) -> Result<RevToken, StoreError> {
        use dashmap::mapref::entry::Entry;

        match self.docs.entry(key(ns, node.id())) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(node.id().clone())),
            Entry::Vacant(vacant) => {
                let rev = next_rev(None);

                let mut stored = node.clone();
                stored.set_rev(rev.clone());
                vacant.insert(stored);

                Ok(rev)
            }
        }
    }

    async fn update(&self, ns: &str, node: &Node) -> Result<CasResult, StoreError> {
        let Some(mut stored) = self.docs.get_mut(&key(ns, node.id())) else {
            return Ok(CasResult::Conflict);
        };

        if stored.rev() != node.rev() {
            return Ok(CasResult::Conflict);
        }

        let rev = next_rev(Some(stored.rev()));

        let mut next = node.clone();
        next.set_rev(rev.clone());
        *stored = next;

        Ok(CasResult::Ok(rev))
    }

    async fn remove(&self, ns: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self.docs.remove(&key(ns, id)).is_some())
    }

    async fn children(&self, ns: &str, parent: &str) -> Result<Vec<Node>, StoreError> {
        let mut rtn = Vec::new();

        for entry in self.docs.iter() {
            if entry.key().0 != ns {
                continue;
            }

            if entry.value().parent().map(|p| p.as_str()) == Some(parent) {
                rtn.push(entry.value().clone());
            }
        }

        Ok(rtn)
    }
}

/// in-memory blob store. writers buffer privately and publish on
/// commit, so readers of an existing key never see a partial write
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<Key, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create(&self, ns: &str, key_str: &str) -> Result<Box<dyn BlobWriter>, StoreError> {
        Ok(Box::new(MemoryBlobWriter {
            blobs: Arc::clone(&self.blobs),
            key: key(ns, key_str),
            buf: BytesMut::new(),
        }))
    }

    async fn open(&self, ns: &str, key_str: &str) -> Result<Option<BlobReader>, StoreError> {
        let Some(found) = self.blobs.get(&key(ns, key_str)) else {
            return Ok(None);
        };

        let reader: BlobReader = Box::new(Cursor::new(found.clone()));

        Ok(Some(reader))
    }

    async fn remove(&self, ns: &str, key_str: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.remove(&key(ns, key_str)).is_some())
    }
}

struct MemoryBlobWriter {
    blobs: Arc<DashMap<Key, Bytes>>,
    key: Key,
    buf: BytesMut,
}

#[async_trait]
impl BlobWriter for MemoryBlobWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.blobs.insert(self.key, self.buf.freeze());
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use tokio::io::AsyncReadExt;

    use crate::doc::DirDoc;
    use super::*;

    #[tokio::test]
    async fn insert_then_cas_update() {
        let store = MemoryDocStore::new();
        let mut node = Node::from(DirDoc::root());

        let rev = store.insert("a.local", &node).await.unwrap();
        node.set_rev(rev.clone());

        // stale writer loses
        let mut stale = node.clone();
        stale.set_rev(String::from("1-bogus"));
        assert_eq!(store.update("a.local", &stale).await.unwrap(), CasResult::Conflict);

        // current writer wins and the token changes
        let CasResult::Ok(next) = store.update("a.local", &node).await.unwrap() else {
            panic!("expected cas success");
        };
        assert_ne!(next, rev);
    }

    #[tokio::test]
    async fn insert_rejects_existing_id() {
        let store = MemoryDocStore::new();
        let node = Node::from(DirDoc::root());

        store.insert("a.local", &node).await.unwrap();

        assert!(matches!(
            store.insert("a.local", &node).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn namespaces_do_not_leak() {
        let store = MemoryDocStore::new();
        let node = Node::from(DirDoc::root());

        store.insert("a.local", &node).await.unwrap();

        assert!(store.get("b.local", node.id()).await.unwrap().is_none());
        assert!(store.children("b.local", node.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blob_invisible_until_commit() {
        let store = MemoryBlobStore::new();

        let mut writer = store.create("a.local", "doc/blob").await.unwrap();
        writer.write_chunk(b"hello ").await.unwrap();
        writer.write_chunk(b"world").await.unwrap();

        assert!(store.open("a.local", "doc/blob").await.unwrap().is_none());

        writer.commit().await.unwrap();

        let mut reader = store.open("a.local", "doc/blob").await.unwrap().unwrap();
        let mut found = Vec::new();
        reader.read_to_end(&mut found).await.unwrap();

        assert_eq!(found, b"hello world");

        // and the other tenant still sees nothing
        assert!(store.open("b.local", "doc/blob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn aborted_blob_leaves_nothing() {
        let store = MemoryBlobStore::new();

        let mut writer = store.create("a.local", "doc/blob").await.unwrap();
        writer.write_chunk(b"partial").await.unwrap();
        writer.abort().await.unwrap();

        assert!(store.open("a.local", "doc/blob").await.unwrap().is_none());
        assert_eq!(store.blob_count(), 0);
    }
}
