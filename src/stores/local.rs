//! On-disk blob store for local development.
//!
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{key}`. Download
//! links point back at this server (`/api/files/{*key}`) and carry an expiry
//! plus an HMAC-SHA256 signature over the key and expiry.

use crate::stores::blob::{BlobError, BlobResult, BlobStore, ByteStream, ensure_key_safe};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Signs and checks download links for the local backend.
#[derive(Clone)]
pub struct LinkSigner {
    secret: Vec<u8>,
}

impl LinkSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> BlobResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|err| BlobError::Misconfigured(err.to_string()))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Hex signature for `key` valid until the Unix timestamp `expires`.
    pub fn sign(&self, key: &str, expires: i64) -> BlobResult<String> {
        Ok(hex::encode(self.mac(key, expires)?.finalize().into_bytes()))
    }

    /// True when `signature` matches and `now` has not passed `expires`.
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if now > expires {
            return false;
        }
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        match self.mac(key, expires) {
            Ok(mac) => mac.verify_slice(&raw).is_ok(),
            Err(_) => false,
        }
    }
}

pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: Url,
    signer: LinkSigner,
}

impl LocalBlobStore {
    /// `public_base_url` is the externally reachable origin of this server,
    /// used to build download links.
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: &str,
        signer: LinkSigner,
    ) -> BlobResult<Self> {
        let url = Url::parse(public_base_url)
            .map_err(|err| BlobError::Misconfigured(format!("public base URL: {}", err)))?;
        if url.cannot_be_a_base() {
            return Err(BlobError::Misconfigured(format!(
                "public base URL `{}` cannot carry a path",
                public_base_url
            )));
        }
        Ok(Self {
            base_path: base_path.into(),
            public_base_url: url,
            signer,
        })
    }

    pub fn signer(&self) -> &LinkSigner {
        &self.signer
    }

    /// Generate two-level shard identifiers for a key.
    ///
    /// Uses MD5(key) and returns the first two bytes as lowercase hex (00–ff).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Open a stored payload for streaming out, with its length.
    pub async fn open(&self, key: &str) -> BlobResult<(File, u64)> {
        ensure_key_safe(key)?;
        let file = File::open(self.object_path(key))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => BlobError::NotFound(key.to_string()),
                _ => BlobError::Io(err),
            })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Recursively remove empty directories up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Stream `body` into `file`, enforcing the declared size, then fsync.
async fn write_exact(file: &mut File, key: &str, mut body: ByteStream, size: u64) -> BlobResult<()> {
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > size {
            return Err(BlobError::SizeMismatch {
                key: key.to_string(),
                expected: size,
                actual: written,
            });
        }
        file.write_all(&chunk).await?;
    }
    if written != size {
        return Err(BlobError::SizeMismatch {
            key: key.to_string(),
            expected: size,
            actual: written,
        });
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    /// Writes to a temporary file beside the target and renames it into place
    /// once the whole body has been written and synced.
    async fn upload(
        &self,
        key: &str,
        body: ByteStream,
        _content_type: &str,
        size: u64,
    ) -> BlobResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_exact(&mut file, key, body, size).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
        }

        debug!(key, path = %file_path.display(), size, "stored object on disk");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(BlobError::NotFound(key.to_string()));
            }
            Err(err) => return Err(BlobError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        ensure_key_safe(key)?;
        if !fs::try_exists(self.object_path(key)).await? {
            return Err(BlobError::NotFound(key.to_string()));
        }

        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        let signature = self.signer.sign(key, expires)?;

        let mut url = self.public_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BlobError::Misconfigured("public base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["api", "files"])
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);
        Ok(url.to_string())
    }

    /// Best-effort write/read/delete of a temp file under `base_path`.
    async fn probe(&self) -> BlobResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(BlobError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::blob::bytes_stream;
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    fn store(dir: &Path) -> LocalBlobStore {
        LocalBlobStore::new(dir, "http://localhost:8080", LinkSigner::new("secret")).unwrap()
    }

    #[test]
    fn signatures_expire_and_bind_the_key() {
        let signer = LinkSigner::new("secret");
        let sig = signer.sign("notes/a/1/x.pdf", 1_000).unwrap();

        assert!(signer.verify("notes/a/1/x.pdf", 1_000, &sig, 999));
        assert!(signer.verify("notes/a/1/x.pdf", 1_000, &sig, 1_000));
        assert!(!signer.verify("notes/a/1/x.pdf", 1_000, &sig, 1_001));
        assert!(!signer.verify("notes/a/1/y.pdf", 1_000, &sig, 999));
        assert!(!signer.verify("notes/a/1/x.pdf", 2_000, &sig, 999));
        assert!(!signer.verify("notes/a/1/x.pdf", 1_000, "not-hex", 999));
        assert!(!LinkSigner::new("other").verify("notes/a/1/x.pdf", 1_000, &sig, 999));
    }

    #[tokio::test]
    async fn upload_open_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = "notes/a@rice.edu/1/calc.pdf";

        store
            .upload(key, bytes_stream(Bytes::from_static(b"%PDF-1.7")), "application/pdf", 8)
            .await
            .unwrap();

        let (mut file, len) = store.open(key).await.unwrap();
        assert_eq!(len, 8);
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"%PDF-1.7");

        store.delete(key).await.unwrap();
        assert!(matches!(store.open(key).await, Err(BlobError::NotFound(_))));
        assert!(matches!(store.delete(key).await, Err(BlobError::NotFound(_))));

        // only the base directory should remain once shards are pruned
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn short_body_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = "notes/a/1/short.pdf";

        let err = store
            .upload(key, bytes_stream(Bytes::from_static(b"abc")), "application/pdf", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::SizeMismatch { actual: 3, .. }));
        assert!(matches!(store.open(key).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn presigned_url_points_at_file_route() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let key = "notes/a@rice.edu/1/calc.pdf";
        store
            .upload(key, bytes_stream(Bytes::from_static(b"%PDF")), "application/pdf", 4)
            .await
            .unwrap();

        let url = store
            .presigned_url(key, Duration::from_secs(900))
            .await
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/api/files/notes/a@rice.edu/1/calc.pdf");

        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        let expires: i64 = pairs["expires"].parse().unwrap();
        assert!(store.signer().verify(key, expires, &pairs["signature"], Utc::now().timestamp()));

        assert!(matches!(
            store.presigned_url("notes/a/2/missing.pdf", Duration::from_secs(1)).await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn probe_writes_under_base_path() {
        let dir = tempfile::tempdir().unwrap();
        store(&dir.path().join("objects")).probe().await.unwrap();
    }
}
