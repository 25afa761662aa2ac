//! Single-request bucket and object operations.

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::transfer::PresignedTransfer;
use crate::{Result, StorageClient, StorageError, TRACING_TARGET_OPERATIONS};

impl StorageClient {
    #[instrument(skip(self), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account()))]
    pub(crate) async fn head_bucket_inner(&self, bucket: &str) -> Result<()> {
        self.as_inner()
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::service("HeadBucket", e))?;

        debug!(target: TRACING_TARGET_OPERATIONS, bucket, "Bucket is accessible");
        Ok(())
    }

    #[instrument(skip(self), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account()))]
    pub(crate) async fn list_objects_inner(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .as_inner()
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| StorageError::service("ListObjectsV2", e))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated() == Some(true) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!(target: TRACING_TARGET_OPERATIONS, bucket, count = keys.len(), "Objects listed");
        Ok(keys)
    }

    #[instrument(skip(self, body), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account(), size = body.len()))]
    pub(crate) async fn put_object_inner(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.as_inner()
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::service("PutObject", e))?;

        debug!(target: TRACING_TARGET_OPERATIONS, bucket, key, "Object uploaded");
        Ok(())
    }

    #[instrument(skip(self), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account()))]
    pub(crate) async fn delete_object_inner(&self, bucket: &str, key: &str) -> Result<()> {
        self.as_inner()
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::service("DeleteObject", e))?;

        debug!(target: TRACING_TARGET_OPERATIONS, bucket, key, "Object deleted");
        Ok(())
    }

    pub(crate) async fn presigned_download_url_inner(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<String> {
        let request = self
            .as_inner()
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config(expiration)?)
            .await
            .map_err(|e| StorageError::service("PresignGetObject", e))?;

        debug!(
            target: TRACING_TARGET_OPERATIONS,
            account = %self.account(),
            bucket,
            key,
            expiration_secs = expiration.as_secs(),
            "Download URL signed"
        );
        Ok(request.uri().to_string())
    }

    pub(crate) async fn check_presigned_download_inner(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<()> {
        let url = self
            .presigned_download_url_inner(bucket, key, expiration)
            .await?;
        self.transfer().probe(&url).await
    }

    #[instrument(skip(self), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account()))]
    pub(crate) async fn object_sha256_inner(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .as_inner()
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::service("GetObject", e))?;

        let mut body = response.body;
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(std::io::Error::other)? {
            size += chunk.len() as u64;
            hasher.update(&chunk);
        }

        let digest = hex::encode(hasher.finalize());
        debug!(target: TRACING_TARGET_OPERATIONS, bucket, key, size, sha256 = %digest, "Object hashed");
        Ok(digest)
    }
}

/// Builds the presigning configuration for a URL lifetime.
pub(super) fn presigning_config(expiration: Duration) -> Result<PresigningConfig> {
    PresigningConfig::expires_in(expiration)
        .map_err(|e| StorageError::InvalidRequest(format!("invalid URL expiration: {e}")))
}
