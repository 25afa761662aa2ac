//! Bucket and object operations exercised by the validators.
//!
//! [`ObjectStorage`] is the seam between the validators and S3: the
//! validators only ever talk to this trait, and [`StorageClient`] implements
//! it on top of aws-sdk-s3. Every call is a single attempt; failures are
//! returned as [`StorageError`](crate::StorageError) with the server's reason.

mod multipart_operations;
mod object_operations;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{Result, StorageClient};

/// A part of a multipart upload that the server acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    /// One-based part number.
    pub part_number: i32,
    /// ETag returned for the part.
    pub etag: String,
}

impl UploadedPart {
    /// Creates an acknowledged part.
    pub fn new(part_number: i32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// Object storage operations available to one account.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Name of the account the operations run as.
    fn account(&self) -> &str;

    /// Checks that the bucket exists and is accessible.
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Lists all object keys in the bucket.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    /// Uploads a local file in parts of `part_size` bytes.
    ///
    /// The upload is aborted if any part or the completion fails.
    async fn upload_file_multipart(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        part_size: u64,
    ) -> Result<()>;

    /// Uploads a small object in a single request.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Copies an object server-side in parts of `part_size` bytes.
    ///
    /// The destination upload is aborted if any part copy fails.
    async fn copy_object_multipart(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
        part_size: u64,
    ) -> Result<()>;

    /// Deletes an object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Signs a GET URL for the object.
    async fn presigned_download_url(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<String>;

    /// Signs a GET URL and fetches the first byte through it.
    async fn check_presigned_download(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<()>;

    /// Streams the object and returns its hex SHA-256.
    async fn object_sha256(&self, bucket: &str, key: &str) -> Result<String>;

    /// Starts a multipart upload and returns its upload id.
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    /// Signs a PUT URL for one part of a multipart upload.
    async fn presigned_upload_part_url(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiration: Duration,
    ) -> Result<String>;

    /// Completes a multipart upload from the acknowledged parts.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<()>;

    /// Aborts a multipart upload and discards its parts.
    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str)
    -> Result<()>;
}

#[async_trait]
impl ObjectStorage for StorageClient {
    fn account(&self) -> &str {
        StorageClient::account(self)
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.head_bucket_inner(bucket).await
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        self.list_objects_inner(bucket).await
    }

    async fn upload_file_multipart(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        part_size: u64,
    ) -> Result<()> {
        self.upload_file_multipart_inner(bucket, key, path, part_size)
            .await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.put_object_inner(bucket, key, body).await
    }

    async fn copy_object_multipart(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
        part_size: u64,
    ) -> Result<()> {
        self.copy_object_multipart_inner(
            source_bucket,
            source_key,
            target_bucket,
            target_key,
            part_size,
        )
        .await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.delete_object_inner(bucket, key).await
    }

    async fn presigned_download_url(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<String> {
        self.presigned_download_url_inner(bucket, key, expiration)
            .await
    }

    async fn check_presigned_download(
        &self,
        bucket: &str,
        key: &str,
        expiration: Duration,
    ) -> Result<()> {
        self.check_presigned_download_inner(bucket, key, expiration)
            .await
    }

    async fn object_sha256(&self, bucket: &str, key: &str) -> Result<String> {
        self.object_sha256_inner(bucket, key).await
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        self.create_multipart_upload_inner(bucket, key).await
    }

    async fn presigned_upload_part_url(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiration: Duration,
    ) -> Result<String> {
        self.presigned_upload_part_url_inner(bucket, key, upload_id, part_number, expiration)
            .await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<()> {
        self.complete_multipart_upload_inner(bucket, key, upload_id, parts)
            .await
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.abort_multipart_upload_inner(bucket, key, upload_id)
            .await
    }
}
