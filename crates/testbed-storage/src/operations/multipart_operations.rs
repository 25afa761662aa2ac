//! Multipart upload and server-side multipart copy.

use std::path::Path;
use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use testbed_core::parts::part_ranges;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use super::UploadedPart;
use super::object_operations::presigning_config;
use crate::{Result, StorageClient, StorageError, TRACING_TARGET_OPERATIONS};

impl StorageClient {
    #[instrument(skip(self, path), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account()))]
    pub(crate) async fn upload_file_multipart_inner(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        part_size: u64,
    ) -> Result<()> {
        let upload_id = self.create_multipart_upload_inner(bucket, key).await?;

        let result = async {
            let parts = self
                .upload_parts_from_file(bucket, key, &upload_id, path, part_size)
                .await?;
            self.complete_multipart_upload_inner(bucket, key, &upload_id, &parts)
                .await
        }
        .await;

        if result.is_err() {
            self.abort_after_failure(bucket, key, &upload_id).await;
        }
        result
    }

    async fn upload_parts_from_file(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        path: &Path,
        part_size: u64,
    ) -> Result<Vec<UploadedPart>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut parts = Vec::new();

        for part_number in 1.. {
            let mut buffer = Vec::new();
            (&mut file).take(part_size).read_to_end(&mut buffer).await?;
            if buffer.is_empty() && part_number > 1 {
                break;
            }

            let size = buffer.len();
            let response = self
                .as_inner()
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buffer))
                .send()
                .await
                .map_err(|e| StorageError::service("UploadPart", e))?;

            let etag = response
                .e_tag()
                .ok_or_else(|| StorageError::InvalidRequest("UploadPart returned no ETag".into()))?;
            debug!(target: TRACING_TARGET_OPERATIONS, part_number, size, "Part uploaded");
            parts.push(UploadedPart::new(part_number, etag));

            if (size as u64) < part_size {
                break;
            }
        }

        Ok(parts)
    }

    #[instrument(skip(self), target = TRACING_TARGET_OPERATIONS, fields(account = %self.account()))]
    pub(crate) async fn copy_object_multipart_inner(
        &self,
        source_bucket: &str,
        source_key: &str,
        target_bucket: &str,
        target_key: &str,
        part_size: u64,
    ) -> Result<()> {
        let head = self
            .as_inner()
            .head_object()
            .bucket(source_bucket)
            .key(source_key)
            .send()
            .await
            .map_err(|e| StorageError::service("HeadObject", e))?;

        let size = head
            .content_length()
            .and_then(|length| u64::try_from(length).ok())
            .filter(|&length| length > 0)
            .ok_or_else(|| {
                StorageError::InvalidRequest(format!(
                    "source object {source_bucket}/{source_key} has no content"
                ))
            })?;

        let upload_id = self
            .create_multipart_upload_inner(target_bucket, target_key)
            .await?;
        let copy_source = format!("{source_bucket}/{source_key}");

        let result = async {
            let mut parts = Vec::new();
            for (part_number, range) in (1..).zip(part_ranges(size, part_size)) {
                let response = self
                    .as_inner()
                    .upload_part_copy()
                    .bucket(target_bucket)
                    .key(target_key)
                    .upload_id(&upload_id)
                    .part_number(part_number)
                    .copy_source(&copy_source)
                    .copy_source_range(format!("bytes={}-{}", range.start(), range.end()))
                    .send()
                    .await
                    .map_err(|e| StorageError::service("UploadPartCopy", e))?;

                let etag = response
                    .copy_part_result()
                    .and_then(|result| result.e_tag())
                    .ok_or_else(|| {
                        StorageError::InvalidRequest("UploadPartCopy returned no ETag".into())
                    })?;
                parts.push(UploadedPart::new(part_number, etag));
            }

            self.complete_multipart_upload_inner(target_bucket, target_key, &upload_id, &parts)
                .await
        }
        .await;

        if result.is_err() {
            self.abort_after_failure(target_bucket, target_key, &upload_id)
                .await;
        }
        result
    }

    pub(crate) async fn create_multipart_upload_inner(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .as_inner()
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::service("CreateMultipartUpload", e))?;

        let upload_id = response.upload_id().ok_or_else(|| {
            StorageError::InvalidRequest("CreateMultipartUpload returned no upload id".into())
        })?;

        debug!(target: TRACING_TARGET_OPERATIONS, bucket, key, upload_id, "Multipart upload created");
        Ok(upload_id.to_string())
    }

    pub(crate) async fn presigned_upload_part_url_inner(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expiration: Duration,
    ) -> Result<String> {
        let request = self
            .as_inner()
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning_config(expiration)?)
            .await
            .map_err(|e| StorageError::service("PresignUploadPart", e))?;

        Ok(request.uri().to_string())
    }

    pub(crate) async fn complete_multipart_upload_inner(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(&part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.as_inner()
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| StorageError::service("CompleteMultipartUpload", e))?;

        debug!(
            target: TRACING_TARGET_OPERATIONS,
            bucket,
            key,
            parts = parts.len(),
            "Multipart upload completed"
        );
        Ok(())
    }

    pub(crate) async fn abort_multipart_upload_inner(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.as_inner()
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| StorageError::service("AbortMultipartUpload", e))?;

        debug!(target: TRACING_TARGET_OPERATIONS, bucket, key, upload_id, "Multipart upload aborted");
        Ok(())
    }

    /// Aborts an upload after a failure; a failed abort is only logged.
    async fn abort_after_failure(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(e) = self.abort_multipart_upload_inner(bucket, key, upload_id).await {
            warn!(
                target: TRACING_TARGET_OPERATIONS,
                account = %self.account(),
                bucket,
                key,
                error = %e,
                "Failed to abort multipart upload"
            );
        }
    }
}
