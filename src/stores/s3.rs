//! AWS S3 blob store built on the `object_store` crate.
//!
//! Credentials come from the standard AWS environment variables
//! (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, ...). Bucket access is not
//! checked up front; the first upload surfaces permission problems.

use crate::stores::blob::{BlobResult, BlobStore, ByteStream, collect_exact, ensure_key_safe};
use async_trait::async_trait;
use axum::http::Method;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload,
    aws::{AmazonS3, AmazonS3Builder},
    path::Path as ObjectPath,
    signer::Signer,
};
use std::time::Duration;
use tracing::{debug, info};

pub struct S3BlobStore {
    client: AmazonS3,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(bucket: &str, region: &str) -> BlobResult<Self> {
        let client = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()?;

        info!(bucket, region, "S3 blob store initialized");
        Ok(Self {
            client,
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    /// Uploads are capped well below S3's single-PUT limit, so the body is
    /// collected and sent in one request.
    async fn upload(
        &self,
        key: &str,
        body: ByteStream,
        content_type: &str,
        size: u64,
    ) -> BlobResult<()> {
        ensure_key_safe(key)?;
        debug!(key, content_type, size, "starting S3 upload");

        let bytes = collect_exact(key, body, size).await?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.client
            .put_opts(&ObjectPath::from(key), PutPayload::from(bytes), opts)
            .await?;

        info!(key, bucket = %self.bucket, "file uploaded to S3");
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client.delete(&ObjectPath::from(key)).await?;
        info!(key, bucket = %self.bucket, "file deleted from S3");
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        let url = self
            .client
            .signed_url(Method::GET, &ObjectPath::from(key), expires_in)
            .await?;
        debug!(key, ?expires_in, "presigned URL generated");
        Ok(url.to_string())
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
