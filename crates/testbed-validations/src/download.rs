//! Presigned URL download validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};
use testbed_core::{DownloadConfig, MIB, sha256_file};
use testbed_storage::{ObjectStorage, PresignedTransfer, StorageClient};
use tracing::{error, info, instrument};
use url::Url;

use crate::testfile::TestFile;
use crate::{Result, TRACING_TARGET_DOWNLOAD};

/// Part size used when uploading the generated test file.
pub const UPLOAD_PART_SIZE: u64 = 8 * MIB;

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Result of one download validation.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Key of the downloaded object.
    pub key: String,
    /// SHA-256 of the uploaded or referenced object.
    pub expected_sha256: String,
    /// SHA-256 of the downloaded file.
    pub actual_sha256: String,
    /// Number of bytes downloaded.
    pub bytes: u64,
    /// Time spent downloading.
    pub duration: Duration,
    /// Local path of the downloaded file.
    pub path: PathBuf,
    /// Expiry of the presigned URL, if the URL carries one.
    pub expires_at: Option<Timestamp>,
}

impl DownloadReport {
    /// Returns whether the downloaded content matches the reference.
    pub fn is_match(&self) -> bool {
        self.expected_sha256 == self.actual_sha256
    }

    /// Returns the download throughput in MB/s.
    pub fn megabytes_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / 1_000_000.0 / secs
        } else {
            0.0
        }
    }
}

/// Downloads an object through a URL signed by a second account.
pub struct DownloadValidator<U, D, T> {
    uploader: U,
    downloader: D,
    transfer: T,
    bucket: String,
    output_dir: PathBuf,
    work_dir: PathBuf,
    test_file_size: u64,
    expiration: Duration,
}

impl<U, D, T> DownloadValidator<U, D, T>
where
    U: ObjectStorage,
    D: ObjectStorage,
    T: PresignedTransfer,
{
    /// Creates a validator that stages test files in the system temp dir.
    pub fn new(uploader: U, downloader: D, transfer: T, config: &DownloadConfig) -> Self {
        Self {
            uploader,
            downloader,
            transfer,
            bucket: config.bucket.clone(),
            output_dir: config.output_dir.clone(),
            work_dir: std::env::temp_dir(),
            test_file_size: config.test_file_size,
            expiration: Duration::from_secs(config.presigned_url_expiration),
        }
    }

    /// Stages generated test files in `dir` instead of the system temp dir.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Runs the validation for `object_key`, or for a freshly uploaded test file.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload, signing, download or hashing fails. A
    /// checksum mismatch is reported through [`DownloadReport::is_match`].
    #[instrument(skip(self), target = TRACING_TARGET_DOWNLOAD, fields(bucket = %self.bucket))]
    pub async fn run(&self, object_key: Option<String>) -> Result<DownloadReport> {
        let (key, expected_sha256) = match object_key {
            Some(key) => {
                info!(
                    target: TRACING_TARGET_DOWNLOAD,
                    key = %key,
                    account = self.uploader.account(),
                    "Computing reference checksum of existing object"
                );
                let sha256 = self.uploader.object_sha256(&self.bucket, &key).await?;
                (key, sha256)
            }
            None => self.upload_test_file().await?,
        };

        let requested_at = Timestamp::now();
        let url = self
            .downloader
            .presigned_download_url(&self.bucket, &key, self.expiration)
            .await?;
        let expires_at = url_expiry(&url);
        info!(
            target: TRACING_TARGET_DOWNLOAD,
            account = self.downloader.account(),
            requested_at = %requested_at,
            expiration_secs = self.expiration.as_secs(),
            expires_at = %expires_at.map(|t| t.to_string()).unwrap_or_else(|| "unknown".to_string()),
            "Presigned download URL created"
        );

        let path = output_path(&self.output_dir, &key);
        let (bytes, duration) = self.transfer.download_to_file(&url, &path).await?;
        let actual_sha256 = sha256_file(&path)?;

        let report = DownloadReport {
            key,
            expected_sha256,
            actual_sha256,
            bytes,
            duration,
            path,
            expires_at,
        };

        info!(
            target: TRACING_TARGET_DOWNLOAD,
            path = %report.path.display(),
            "Downloaded {} bytes in {:.2}s ({:.2} MB/s)",
            report.bytes,
            report.duration.as_secs_f64(),
            report.megabytes_per_second(),
        );
        log_comparison(&report);

        Ok(report)
    }

    async fn upload_test_file(&self) -> Result<(String, String)> {
        let file = TestFile::random_filled(&self.work_dir, self.uploader.account(), self.test_file_size)?;
        let sha256 = sha256_file(file.path())?;

        info!(
            target: TRACING_TARGET_DOWNLOAD,
            key = file.key(),
            size = file.size(),
            account = self.uploader.account(),
            "Uploading test file"
        );
        self.uploader
            .upload_file_multipart(&self.bucket, file.key(), file.path(), UPLOAD_PART_SIZE)
            .await?;

        Ok((file.key().to_string(), sha256))
    }
}

fn log_comparison(report: &DownloadReport) {
    if report.is_match() {
        info!(
            target: TRACING_TARGET_DOWNLOAD,
            sha256 = %report.actual_sha256,
            "Checksum of downloaded file matches"
        );
    } else {
        error!(
            target: TRACING_TARGET_DOWNLOAD,
            expected = %report.expected_sha256,
            actual = %report.actual_sha256,
            "Checksum mismatch: expected {}, got {}",
            report.expected_sha256,
            report.actual_sha256,
        );
    }
}

/// Derives the expiry instant of a presigned URL.
///
/// SigV4 URLs carry `X-Amz-Date` and `X-Amz-Expires`; SigV2 URLs carry an
/// absolute `Expires` in epoch seconds.
pub fn url_expiry(url: &str) -> Option<Timestamp> {
    let url = Url::parse(url).ok()?;

    let mut signed_at = None;
    let mut expires_in = None;
    let mut expires = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "X-Amz-Date" => signed_at = Some(value.into_owned()),
            "X-Amz-Expires" => expires_in = value.parse::<i64>().ok(),
            "Expires" => expires = value.parse::<i64>().ok(),
            _ => {}
        }
    }

    if let (Some(signed_at), Some(secs)) = (signed_at, expires_in) {
        let signed_at = DateTime::strptime(AMZ_DATE_FORMAT, &signed_at)
            .ok()?
            .to_zoned(TimeZone::UTC)
            .ok()?
            .timestamp();
        return signed_at.checked_add(SignedDuration::from_secs(secs)).ok();
    }

    expires.and_then(|secs| Timestamp::from_second(secs).ok())
}

/// Connects both accounts and runs the download validation.
///
/// # Errors
///
/// Returns an error if a client cannot be created or any step of the run fails.
pub async fn run_download_validation(
    config: &DownloadConfig,
    object_key: Option<String>,
) -> Result<DownloadReport> {
    let endpoint = &config.s3_url_endpoint;
    let region = &config.s3_region;

    let uploader = StorageClient::connect(endpoint, region, &config.account_for_upload).await?;
    let downloader = StorageClient::connect(endpoint, region, &config.account_for_download).await?;
    let transfer = downloader.transfer().clone();

    DownloadValidator::new(uploader, downloader, transfer, config)
        .run(object_key)
        .await
}

/// Returns the local path the object `key` is downloaded to.
pub fn output_path(output_dir: &Path, key: &str) -> PathBuf {
    output_dir.join(key)
}
