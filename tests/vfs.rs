use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream};
use md5::{Md5, Digest};

use nimbus::{Instance, Vfs, ErrorKind};
use nimbus::consts;
use nimbus::doc::{Node, DirDoc, DocPatch};
use nimbus::store::{BlobStore, DocStore, MemoryDocStore, MemoryBlobStore};
use nimbus::vfs::{NewFile, Overwrite, Disposition};
use nimbus::vfs::content::parse_content_md5;

fn stores() -> (Arc<MemoryDocStore>, Arc<MemoryBlobStore>) {
    (Arc::new(MemoryDocStore::new()), Arc::new(MemoryBlobStore::new()))
}

async fn vfs_on(
    domain: &str,
    docs: &Arc<MemoryDocStore>,
    blobs: &Arc<MemoryBlobStore>,
) -> Vfs {
    use tracing_subscriber::{FmtSubscriber, EnvFilter};

    let _ = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let vfs = Vfs::new(
        Instance::new(domain).unwrap(),
        Arc::clone(docs) as Arc<dyn DocStore>,
        Arc::clone(blobs) as Arc<dyn BlobStore>,
    );

    vfs.init().await.unwrap();

    vfs
}

fn body(given: &'static [u8]) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin {
    stream::iter(vec![Ok(Bytes::from_static(given))])
}

fn digest(given: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(given);
    hasher.finalize().into()
}

#[tokio::test]
async fn upload_then_read_back() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let dir = vfs.mkdir("/a", Default::default()).await.unwrap();

    // a declared length and digest matching the body
    let declared = parse_content_md5("XrY7u+Ae7tCTyyK7j1rNww==").unwrap();
    let req = NewFile::new(dir.id.clone(), "report.txt")
        .with_size(11)
        .with_md5(declared)
        .with_mime(mime::TEXT_PLAIN);

    let file = vfs.create_file(req, body(b"hello world")).await.unwrap();

    assert_eq!(file.size, 11);
    assert_eq!(file.md5, declared);
    assert!(file.rev.starts_with("1-"));

    let found = vfs.get_by_path("/a/report.txt").await.unwrap();
    assert_eq!(found.id(), &file.id);

    let content = vfs.serve_content(&file.id, Disposition::Attachment).await.unwrap();
    assert_eq!(content.size, 11);
    assert_eq!(content.mime, mime::TEXT_PLAIN);
    assert_eq!(content.disposition_header(), "attachment; filename=\"report.txt\"");

    let mut read_back = Vec::new();
    let copied = content.copy_to(&mut read_back).await.unwrap();

    assert_eq!(copied, 11);
    assert_eq!(read_back, b"hello world");
}

#[tokio::test]
async fn chunked_upload_without_declared_size() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let chunks = stream::iter(vec![
        Ok(Bytes::from_static(b"hello ")),
        Ok(Bytes::from_static(b"world")),
    ]);

    let req = NewFile::new(consts::ROOT_DIR_ID, "streamed.bin");
    let file = vfs.create_file(req, chunks).await.unwrap();

    assert_eq!(file.size, 11);
    assert_eq!(file.md5, digest(b"hello world"));
    assert_eq!(file.mime, mime::APPLICATION_OCTET_STREAM);
}

#[tokio::test]
async fn upload_from_a_reader() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let reader = std::io::Cursor::new(&b"reader backed body"[..]);
    let stream = tokio_util::io::ReaderStream::new(reader);

    let file = vfs
        .create_file(NewFile::new(consts::ROOT_DIR_ID, "r.bin"), stream)
        .await
        .unwrap();

    assert_eq!(file.size, 18);
    assert_eq!(file.md5, digest(b"reader backed body"));
}

#[tokio::test]
async fn bad_digest_leaves_no_trace() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let req = NewFile::new(consts::ROOT_DIR_ID, "f.txt")
        .with_md5([0xff; 16]);

    let err = vfs.create_file(req, body(b"hello world")).await.unwrap_err();

    assert!(err.is_kind(ErrorKind::InvalidHash), "got {}", err);
    assert_eq!(blobs.blob_count(), 0);
    assert!(vfs.get_by_path("/f.txt").await.unwrap_err().is_kind(ErrorKind::NotFound));
}

#[tokio::test]
async fn length_mismatch_rejected() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let req = NewFile::new(consts::ROOT_DIR_ID, "f.txt")
        .with_size(5);

    let err = vfs.create_file(req, body(b"hello world")).await.unwrap_err();

    assert!(err.is_kind(ErrorKind::ContentLengthMismatch), "got {}", err);
    assert_eq!(blobs.blob_count(), 0);
}

#[tokio::test]
async fn interrupted_upload_discards_partial_blob() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let interrupted = stream::iter(vec![
        Ok(Bytes::from_static(b"part")),
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client went away")),
    ]);

    let req = NewFile::new(consts::ROOT_DIR_ID, "f.txt");

    assert!(vfs.create_file(req, interrupted).await.is_err());
    assert_eq!(blobs.blob_count(), 0);
}

#[tokio::test]
async fn overwrite_is_guarded_by_revision() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let req = NewFile::new(consts::ROOT_DIR_ID, "notes.txt")
        .with_mime(mime::TEXT_PLAIN);
    let file = vfs.create_file(req, body(b"first")).await.unwrap();

    // a stale token is rejected before the stream is consumed
    let err = vfs
        .overwrite(&file.id, Some("1-bogus"), Overwrite::new(), body(b"second"))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::Conflict), "got {}", err);

    let untouched = vfs.serve_content(&file.id, Disposition::Inline).await.unwrap();
    let mut read_back = Vec::new();
    untouched.copy_to(&mut read_back).await.unwrap();
    assert_eq!(read_back, b"first");

    // the current token wins and the superseded blob goes away
    let next = vfs
        .overwrite(&file.id, Some(file.rev.as_str()), Overwrite::new().with_size(6), body(b"second"))
        .await
        .unwrap();

    assert!(next.rev.starts_with("2-"));
    assert_eq!(next.size, 6);
    assert_ne!(next.blob, file.blob);
    assert_eq!(blobs.blob_count(), 1);

    let replaced = vfs.serve_content(&file.id, Disposition::Inline).await.unwrap();
    let mut read_back = Vec::new();
    replaced.copy_to(&mut read_back).await.unwrap();
    assert_eq!(read_back, b"second");
}

#[tokio::test]
async fn failed_overwrite_keeps_original_content() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let file = vfs
        .create_file(NewFile::new(consts::ROOT_DIR_ID, "f.txt"), body(b"original"))
        .await
        .unwrap();

    let err = vfs
        .overwrite(
            &file.id,
            None,
            Overwrite::new().with_md5([0xff; 16]),
            body(b"replacement"),
        )
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::InvalidHash), "got {}", err);
    assert_eq!(blobs.blob_count(), 1);

    let current = vfs.get_file(&file.id).await.unwrap();
    assert_eq!(current.rev, file.rev);
    assert_eq!(current.md5, digest(b"original"));
}

#[tokio::test]
async fn sibling_names_are_unique_among_active_documents() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let first = vfs.create_dir(consts::ROOT_DIR_ID, "a", Default::default()).await.unwrap();

    let err = vfs.create_dir(consts::ROOT_DIR_ID, "a", Default::default()).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::Conflict), "got {}", err);

    // trashing the holder frees the slot
    vfs.trash(&first.id, None).await.unwrap();
    let second = vfs.create_dir(consts::ROOT_DIR_ID, "a", Default::default()).await.unwrap();
    assert_ne!(second.id, first.id);

    // and the trashed original can no longer come back under that name
    let err = vfs.restore(&first.id, None).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::Conflict), "got {}", err);
}

#[tokio::test]
async fn trash_then_restore_keeps_identity() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let dir = vfs.mkdir("/docs", Default::default()).await.unwrap();
    let file = vfs
        .create_file(NewFile::new(dir.id.clone(), "f.txt"), body(b"body"))
        .await
        .unwrap();

    vfs.trash(&file.id, None).await.unwrap();

    assert!(vfs.get_by_path("/docs/f.txt").await.unwrap_err().is_kind(ErrorKind::NotFound));

    let trashed = vfs.list_trash().await.unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id(), &file.id);

    // trashed content stays readable until purged
    let content = vfs.serve_content(&file.id, Disposition::Inline).await.unwrap();
    let mut read_back = Vec::new();
    content.copy_to(&mut read_back).await.unwrap();
    assert_eq!(read_back, b"body");

    let restored = vfs.restore(&file.id, None).await.unwrap();
    assert_eq!(restored.id(), &file.id);
    assert!(restored.restore_parent().is_none());

    let found = vfs.get_by_path("/docs/f.txt").await.unwrap();
    assert_eq!(found.id(), &file.id);
    assert!(vfs.list_trash().await.unwrap().is_empty());
}

#[tokio::test]
async fn trashing_a_directory_takes_the_subtree_along() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let parent = vfs.mkdir_all("/a/b", Default::default()).await.unwrap();
    let file = vfs
        .create_file(NewFile::new(parent.id.clone(), "f.txt"), body(b"body"))
        .await
        .unwrap();

    let top = vfs.get_by_path("/a").await.unwrap();
    vfs.trash(top.id(), None).await.unwrap();

    // only the subtree root shows in the trash listing
    let trashed = vfs.list_trash().await.unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id(), top.id());

    // descendants are in the trash through their ancestor
    let inner = vfs.get_dir(&parent.id).await.unwrap();
    assert!(inner.in_trash());
    assert_eq!(inner.path, "/.trash/a/b");

    // and cannot be restored on their own
    let err = vfs.restore(&file.id, None).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::FileInTrash), "got {}", err);

    vfs.restore(top.id(), None).await.unwrap();

    let found = vfs.get_by_path("/a/b/f.txt").await.unwrap();
    assert_eq!(found.id(), &file.id);
    assert_eq!(vfs.get_dir(&parent.id).await.unwrap().path, "/a/b");
}

#[tokio::test]
async fn purge_removes_content_and_metadata() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let dir = vfs.mkdir("/a", Default::default()).await.unwrap();
    let file = vfs
        .create_file(NewFile::new(dir.id.clone(), "f.txt"), body(b"body"))
        .await
        .unwrap();

    // active files must pass through the trash
    let err = vfs.purge(&file.id).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::FileInTrash), "got {}", err);

    // active directories with children are protected
    let err = vfs.purge(&dir.id).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::DirNotEmpty), "got {}", err);

    vfs.trash(&dir.id, None).await.unwrap();
    vfs.purge(&dir.id).await.unwrap();

    assert_eq!(blobs.blob_count(), 0);
    assert!(vfs.get_node(&dir.id).await.unwrap_err().is_kind(ErrorKind::NotFound));
    assert!(vfs.get_node(&file.id).await.unwrap_err().is_kind(ErrorKind::NotFound));
    assert!(vfs.list_trash().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_active_directory_purges_directly() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let dir = vfs.mkdir("/empty", Default::default()).await.unwrap();

    vfs.purge(&dir.id).await.unwrap();

    assert!(vfs.get_node(&dir.id).await.unwrap_err().is_kind(ErrorKind::NotFound));
}

#[tokio::test]
async fn moves_cannot_create_cycles() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let leaf = vfs.mkdir_all("/a/b/c", Default::default()).await.unwrap();
    let top = vfs.get_by_path("/a").await.unwrap();

    let err = vfs
        .patch(top.id(), None, DocPatch::reparent(leaf.id.clone()))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::ForbiddenDocMove), "got {}", err);

    let err = vfs
        .patch(top.id(), None, DocPatch::reparent(top.id().clone()))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::ForbiddenDocMove), "got {}", err);
}

#[tokio::test]
async fn renaming_a_directory_updates_descendant_paths() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let leaf = vfs.mkdir_all("/a/b/c", Default::default()).await.unwrap();
    let top = vfs.get_by_path("/a").await.unwrap();

    vfs.patch(top.id(), None, DocPatch::rename("z")).await.unwrap();

    let moved = vfs.get_by_path("/z/b/c").await.unwrap();
    assert_eq!(moved.id(), &leaf.id);
    assert_eq!(moved.as_dir().unwrap().path, "/z/b/c");

    assert!(vfs.resolve_path("/a").await.unwrap_err().is_kind(ErrorKind::NotFound));
}

#[tokio::test]
async fn retried_rename_repairs_descendant_paths() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let leaf = vfs.mkdir_all("/a/b", Default::default()).await.unwrap();
    let top = vfs.get_by_path("/a").await.unwrap();

    vfs.patch(top.id(), None, DocPatch::rename("z")).await.unwrap();

    // simulate a descendant refresh that died after the rename
    // committed by writing the old path back
    let mut stale = vfs.get_dir(&leaf.id).await.unwrap();
    stale.path = String::from("/a/b");
    docs.update("alice.local", &Node::from(stale)).await.unwrap();

    assert_eq!(vfs.get_dir(&leaf.id).await.unwrap().path, "/a/b");

    // retrying the same patch is a metadata no-op but still repairs
    // the subtree
    vfs.patch(top.id(), None, DocPatch::rename("z")).await.unwrap();

    assert_eq!(vfs.get_dir(&leaf.id).await.unwrap().path, "/z/b");
}

#[tokio::test]
async fn canonical_path_walks_the_parent_chain() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let dir = vfs.mkdir_all("/a/b", Default::default()).await.unwrap();
    vfs.create_file(NewFile::new(dir.id.clone(), "f.txt"), body(b"body"))
        .await
        .unwrap();

    let node = vfs.get_by_path("/a/b/f.txt").await.unwrap();
    assert_eq!(vfs.canonical_path(&node).await.unwrap(), "/a/b/f.txt");

    let node = vfs.get_by_path("/a/b").await.unwrap();
    assert_eq!(vfs.canonical_path(&node).await.unwrap(), "/a/b");

    let root = vfs.get_node(consts::ROOT_DIR_ID).await.unwrap();
    assert_eq!(vfs.canonical_path(&root).await.unwrap(), "/");
}

#[tokio::test]
async fn canonical_path_flags_missing_ancestors() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    // a document whose parent points nowhere
    let orphan = DirDoc::create("lost", "gone", "/", Default::default());
    docs.insert("alice.local", &Node::from(orphan.clone())).await.unwrap();

    let node = vfs.get_node(&orphan.id).await.unwrap();
    let err = vfs.canonical_path(&node).await.unwrap_err();

    assert!(err.is_kind(ErrorKind::Orphaned), "got {}", err);
}

#[tokio::test]
async fn canonical_path_flags_parent_cycles() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    // two directories pointing at each other, bypassing the engine
    let mut first = DirDoc::create("first", consts::ROOT_DIR_ID, "/", Default::default());
    let second = DirDoc::create("second", first.id.clone(), "/first", Default::default());
    first.parent = Some(second.id.clone());

    docs.insert("alice.local", &Node::from(first.clone())).await.unwrap();
    docs.insert("alice.local", &Node::from(second)).await.unwrap();

    let node = vfs.get_node(&first.id).await.unwrap();
    let err = vfs.canonical_path(&node).await.unwrap_err();

    assert!(err.is_kind(ErrorKind::Orphaned), "got {}", err);
}

#[tokio::test]
async fn moving_a_file_between_directories() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let src = vfs.mkdir("/src", Default::default()).await.unwrap();
    let dst = vfs.mkdir("/dst", Default::default()).await.unwrap();

    let file = vfs
        .create_file(NewFile::new(src.id.clone(), "f.txt"), body(b"body"))
        .await
        .unwrap();

    vfs.patch(&file.id, None, DocPatch::reparent(dst.id.clone())).await.unwrap();

    assert!(vfs.get_by_path("/src/f.txt").await.unwrap_err().is_kind(ErrorKind::NotFound));
    assert_eq!(vfs.get_by_path("/dst/f.txt").await.unwrap().id(), &file.id);

    // the destination slot must be free
    vfs.create_file(NewFile::new(src.id.clone(), "taken"), body(b""))
        .await
        .unwrap();
    vfs.create_file(NewFile::new(dst.id.clone(), "taken"), body(b""))
        .await
        .unwrap();

    let blocked = vfs.get_by_path("/src/taken").await.unwrap();
    let err = vfs
        .patch(blocked.id(), None, DocPatch::reparent(dst.id.clone()))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::Conflict), "got {}", err);
}

#[tokio::test]
async fn mkdir_all_reuses_existing_ancestors() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let first = vfs.mkdir_all("/a/b", Default::default()).await.unwrap();
    let second = vfs.mkdir_all("/a/b/c", Default::default()).await.unwrap();

    assert_eq!(second.parent.as_deref(), Some(first.id.as_str()));

    // the full path already existing is a conflict
    let err = vfs.mkdir_all("/a/b/c", Default::default()).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::Conflict), "got {}", err);

    // a file in the middle of the path is not
    vfs.create_file(NewFile::new(first.id.clone(), "f"), body(b""))
        .await
        .unwrap();

    let err = vfs.mkdir_all("/a/b/f/deeper", Default::default()).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::NotADirectory), "got {}", err);
}

#[tokio::test]
async fn nothing_is_created_inside_the_trash() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    let err = vfs
        .create_dir(consts::TRASH_DIR_ID, "sneaky", Default::default())
        .await
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::FileInTrash), "got {}", err);

    let err = vfs
        .create_file(NewFile::new(consts::TRASH_DIR_ID, "sneaky"), body(b""))
        .await
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::FileInTrash), "got {}", err);
}

#[tokio::test]
async fn reserved_directories_are_immutable() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    for id in [consts::ROOT_DIR_ID, consts::TRASH_DIR_ID] {
        let err = vfs.patch(id, None, DocPatch::rename("renamed")).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::ForbiddenDocMove), "patch of {} gave {}", id, err);

        let err = vfs.trash(id, None).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::ForbiddenDocMove), "trash of {} gave {}", id, err);

        let err = vfs.purge(id).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::ForbiddenDocMove), "purge of {} gave {}", id, err);
    }
}

#[tokio::test]
async fn tenants_share_stores_without_seeing_each_other() {
    let (docs, blobs) = stores();
    let alice = vfs_on("alice.local", &docs, &blobs).await;
    let bob = vfs_on("bob.local", &docs, &blobs).await;

    let file = alice
        .create_file(NewFile::new(consts::ROOT_DIR_ID, "secret.txt"), body(b"alice"))
        .await
        .unwrap();

    assert!(bob.get_node(&file.id).await.unwrap_err().is_kind(ErrorKind::NotFound));
    assert!(bob.get_by_path("/secret.txt").await.unwrap_err().is_kind(ErrorKind::NotFound));
    assert!(bob.list_dir(consts::ROOT_DIR_ID).await.unwrap().is_empty());

    // the same path is free in the other namespace
    let other = bob
        .create_file(NewFile::new(consts::ROOT_DIR_ID, "secret.txt"), body(b"bob"))
        .await
        .unwrap();

    let content = alice.serve_content(&file.id, Disposition::Inline).await.unwrap();
    let mut read_back = Vec::new();
    content.copy_to(&mut read_back).await.unwrap();
    assert_eq!(read_back, b"alice");

    let content = bob.serve_content(&other.id, Disposition::Inline).await.unwrap();
    let mut read_back = Vec::new();
    content.copy_to(&mut read_back).await.unwrap();
    assert_eq!(read_back, b"bob");
}

#[tokio::test]
async fn listing_is_sorted_by_name() {
    let (docs, blobs) = stores();
    let vfs = vfs_on("alice.local", &docs, &blobs).await;

    for name in ["zebra", "alpha", "mango"] {
        vfs.create_dir(consts::ROOT_DIR_ID, name, Default::default()).await.unwrap();
    }

    let listed: Vec<String> = vfs.list_dir(consts::ROOT_DIR_ID).await.unwrap()
        .iter()
        .map(|node| node.basename().to_owned())
        .collect();

    // the trash root lives under "/" as well
    assert_eq!(listed, vec![".trash", "alpha", "mango", "zebra"]);
}
