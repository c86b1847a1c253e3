#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use rice_notes::{
    models::note::{FileUpload, NewNote, Note},
    stores::{
        blob::{BlobError, BlobResult, BlobStore, ByteStream, MemoryBlobStore, bytes_stream},
        metadata::{NoteRepository, RepositoryError, RepositoryResult, SqliteNoteRepository},
    },
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use uuid::Uuid;

pub const ALICE: &str = "alice@rice.edu";
pub const BOB: &str = "bob@rice.edu";

/// In-memory SQLite with the schema applied. One connection, so every query
/// sees the same database.
pub async fn memory_repository() -> SqliteNoteRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let repo = SqliteNoteRepository::new(pool);
    repo.migrate().await.unwrap();
    repo
}

pub fn pdf_bytes(len: usize) -> Bytes {
    let mut body = b"%PDF-1.4\n".to_vec();
    body.resize(len.max(body.len()), b'x');
    body.truncate(len);
    Bytes::from(body)
}

pub fn new_note(owner: &str, title: &str, course: &str, file_name: &str, body: Bytes) -> NewNote {
    NewNote {
        owner: owner.to_string(),
        title: title.to_string(),
        course_id: course.to_string(),
        file: Some(FileUpload {
            file_name: file_name.to_string(),
            declared_size: body.len() as u64,
            body: bytes_stream(body),
        }),
    }
}

/// Memory blob store that counts calls and can be told to fail.
#[derive(Default)]
pub struct SpyBlobStore {
    pub inner: MemoryBlobStore,
    pub uploads: AtomicUsize,
    pub deletes: AtomicUsize,
    pub fail_uploads: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl SpyBlobStore {
    pub fn calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for SpyBlobStore {
    async fn upload(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        size: u64,
    ) -> BlobResult<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::Misconfigured("upload refused".into()));
        }
        self.inner.upload(key, body, content_type, size).await
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Misconfigured("delete refused".into()));
        }
        self.inner.delete(key).await
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        self.inner.presigned_url(key, expires_in).await
    }

    fn backend(&self) -> &'static str {
        "spy"
    }
}

/// Memory blob store whose readiness check fails with backend detail.
#[derive(Default)]
pub struct UnreachableBlobStore {
    pub inner: MemoryBlobStore,
}

pub const BACKEND_FAILURE_DETAIL: &str = "HeadBucket rice-notes-private: access key AKIAEXAMPLE denied";

#[async_trait]
impl BlobStore for UnreachableBlobStore {
    async fn upload(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        size: u64,
    ) -> BlobResult<()> {
        self.inner.upload(key, body, content_type, size).await
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.inner.delete(key).await
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        self.inner.presigned_url(key, expires_in).await
    }

    async fn probe(&self) -> BlobResult<()> {
        Err(BlobError::Misconfigured(BACKEND_FAILURE_DETAIL.into()))
    }

    fn backend(&self) -> &'static str {
        "unreachable"
    }
}

/// Repository that still finds rows but whose deletes match nothing, as when
/// another request removed the row between the lookup and the delete.
pub struct VanishingRows {
    pub inner: SqliteNoteRepository,
}

#[async_trait]
impl NoteRepository for VanishingRows {
    async fn insert(&self, note: &Note) -> RepositoryResult<()> {
        self.inner.insert(note).await
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Note>> {
        self.inner.find_by_id(id).await
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        course_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Note>> {
        self.inner.list_by_owner(owner, course_id, limit, offset).await
    }

    async fn delete(&self, _id: Uuid, _owner: &str) -> RepositoryResult<bool> {
        Ok(false)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.inner.ping().await
    }
}

/// Repository whose inserts always fail; reads go to the wrapped store.
pub struct FailingInserts {
    pub inner: SqliteNoteRepository,
    pub inserts: AtomicUsize,
}

impl FailingInserts {
    pub fn new(inner: SqliteNoteRepository) -> Self {
        Self {
            inner,
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NoteRepository for FailingInserts {
    async fn insert(&self, _note: &Note) -> RepositoryResult<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(RepositoryError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Note>> {
        self.inner.find_by_id(id).await
    }

    async fn list_by_owner(
        &self,
        owner: &str,
        course_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<Note>> {
        self.inner.list_by_owner(owner, course_id, limit, offset).await
    }

    async fn delete(&self, id: Uuid, owner: &str) -> RepositoryResult<bool> {
        self.inner.delete(id, owner).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.inner.ping().await
    }
}
