//! Blob storage abstraction for note payloads.
//!
//! `BlobStore` is the seam between the orchestrator and whichever backend is
//! configured: S3 (`stores::s3`), local disk (`stores::local`) or the
//! in-process `MemoryBlobStore` defined here.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{StreamExt, stream::BoxStream};
use std::{collections::HashMap, io, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Inbound byte stream for an upload. Consumed exactly once.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error("object `{key}` body was {actual} bytes, expected {expected}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },
    #[error("blob store misconfigured: {0}")]
    Misconfigured(String),
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Upload, delete and link generation for blobs addressed by storage key.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `key`. The stream must yield exactly `size` bytes.
    async fn upload(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        size: u64,
    ) -> BlobResult<()>;

    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// A time-limited URL a browser can download the blob from.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> BlobResult<String>;

    /// Readiness check. Backends without a cheap probe report healthy.
    async fn probe(&self) -> BlobResult<()> {
        Ok(())
    }

    /// Short backend name for logs and readiness output.
    fn backend(&self) -> &'static str;
}

/// Build the storage key for a note: `notes/{owner}/{note_id}/{file_name}`.
///
/// Owner and note id together make the key unique without a lookup, and keep
/// each owner's objects under one prefix.
pub fn storage_key(owner: &str, note_id: &uuid::Uuid, file_name: &str) -> String {
    format!("notes/{}/{}/{}", owner, note_id, file_name)
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or oversized keys, keys that begin with `/`, have a `.` or
/// `..` segment, backslashes or control characters.
pub fn ensure_key_safe(key: &str) -> BlobResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(BlobError::InvalidKey);
    }
    if key.starts_with('/') || key.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(BlobError::InvalidKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(BlobError::InvalidKey);
    }
    Ok(())
}

/// Drain `body` into memory, failing as soon as it exceeds `size` bytes and
/// again at the end if it came up short.
pub async fn collect_exact(key: &str, mut body: ByteStream, size: u64) -> BlobResult<Bytes> {
    let mut buf = BytesMut::with_capacity(size as usize);
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if buf.len() as u64 + chunk.len() as u64 > size {
            return Err(BlobError::SizeMismatch {
                key: key.to_string(),
                expected: size,
                actual: buf.len() as u64 + chunk.len() as u64,
            });
        }
        buf.extend_from_slice(&chunk);
    }
    if buf.len() as u64 != size {
        return Err(BlobError::SizeMismatch {
            key: key.to_string(),
            expected: size,
            actual: buf.len() as u64,
        });
    }
    Ok(buf.freeze())
}

#[derive(Clone, Debug)]
struct StoredBlob {
    bytes: Bytes,
    content_type: String,
}

/// In-memory blob store used for tests and when mock storage is enabled.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `key`, if any.
    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|b| b.bytes.clone())
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|b| b.content_type.clone())
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        size: u64,
    ) -> BlobResult<()> {
        ensure_key_safe(key)?;
        let bytes = collect_exact(key, body, size).await?;
        debug!(key, size = bytes.len(), "mock upload successful");
        self.objects.write().await.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        match self.objects.write().await.remove(key) {
            Some(_) => {
                debug!(key, "mock delete successful");
                Ok(())
            }
            None => Err(BlobError::NotFound(key.to_string())),
        }
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(BlobError::NotFound(key.to_string()));
        }
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "https://mock-bucket.s3.amazonaws.com/{}?expires={}",
            key, expires
        ))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Wrap an in-memory buffer as a single-chunk `ByteStream`.
pub fn bytes_stream(bytes: Bytes) -> ByteStream {
    futures::stream::once(async move { Ok(bytes) }).boxed()
}
