//! Encrypted upload and download benchmark.
//!
//! A local file is encrypted on the fly and uploaded part by part through
//! presigned `UploadPart` URLs. It is then downloaded in ranged requests
//! through a presigned GET URL and decrypted on the fly. Both directions
//! record per-part durations and checksums, and the checksums must agree.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use testbed_core::crypto::{Decryptor, Encryptor, FileSecret, encrypted_size};
use testbed_core::parts::{adjust_part_size, part_count, part_ranges};
use testbed_core::{Checksums, MIB, UploadConfig};
use testbed_storage::{ObjectStorage, PresignedTransfer, StorageClient, UploadedPart};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{Error, Result, TRACING_TARGET_BENCHMARK};

/// Lifetime of the presigned URLs used by the benchmark (one day).
pub const PRESIGNED_URL_EXPIRATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Timings, sizes and identifiers of one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkSummary {
    /// Wall time of the whole run.
    pub elapsed: Duration,
    /// Duration of every part upload, in part order.
    pub upload_times: Vec<Duration>,
    /// Duration of every part download, in part order.
    pub download_times: Vec<Duration>,
    /// Object key the encrypted file was stored under.
    pub file_id: String,
    /// Absolute path of the benchmarked file, as given if it cannot be resolved.
    pub original_path: PathBuf,
    /// Part size in bytes.
    pub part_size: u64,
    /// Size of the plain file.
    pub unencrypted_size: u64,
    /// Size of the encrypted object.
    pub encrypted_size: u64,
    /// Base64 of the file secret.
    pub secret_base64: String,
}

impl BenchmarkSummary {
    /// Returns the relative size increase caused by encryption, in percent.
    pub fn size_change_percent(&self) -> f64 {
        if self.unencrypted_size == 0 {
            return 0.0;
        }
        (self.encrypted_size as f64 / self.unencrypted_size as f64 - 1.0) * 100.0
    }

    /// Logs the `SUMMARY:` lines.
    pub fn log(&self) {
        info!(target: TRACING_TARGET_BENCHMARK, "SUMMARY: Elapsed time: {:.3}s", self.elapsed.as_secs_f64());
        log_part_times("Upload", &self.upload_times);
        log_part_times("Download", &self.download_times);
        info!(target: TRACING_TARGET_BENCHMARK, "SUMMARY: File UUID: {}", self.file_id);
        info!(target: TRACING_TARGET_BENCHMARK, "SUMMARY: Original path: {}", self.original_path.display());
        info!(target: TRACING_TARGET_BENCHMARK, "SUMMARY: Part size: {} MiB", self.part_size as f64 / MIB as f64);
        info!(target: TRACING_TARGET_BENCHMARK, "SUMMARY: Unencrypted size: {} bytes", self.unencrypted_size);
        info!(
            target: TRACING_TARGET_BENCHMARK,
            "SUMMARY: Encrypted size: {} bytes ({:+.3}%)",
            self.encrypted_size,
            self.size_change_percent(),
        );
        info!(target: TRACING_TARGET_BENCHMARK, "SUMMARY: File secret (base64): {}", self.secret_base64);
    }
}

/// Average, fastest and slowest of a list of part durations.
pub fn part_time_stats(times: &[Duration]) -> Option<(Duration, Duration, Duration)> {
    let fastest = times.iter().min()?;
    let slowest = times.iter().max()?;
    let average = times.iter().sum::<Duration>() / times.len() as u32;
    Some((average, *fastest, *slowest))
}

fn log_part_times(direction: &str, times: &[Duration]) {
    if let Some((average, fastest, slowest)) = part_time_stats(times) {
        info!(
            target: TRACING_TARGET_BENCHMARK,
            "SUMMARY: {direction} part time: average {:.3}s, fastest {:.3}s, slowest {:.3}s ({} parts)",
            average.as_secs_f64(),
            fastest.as_secs_f64(),
            slowest.as_secs_f64(),
            times.len(),
        );
    }
}

fn mib_per_second(bytes: usize, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MIB as f64 / secs
    } else {
        0.0
    }
}

/// State carried from the upload into the download phase.
struct Upload {
    times: Vec<Duration>,
    secret: FileSecret,
    checksums: Checksums,
    encrypted_size: u64,
}

/// Benchmarks one file against one bucket.
pub struct Benchmark<S, T> {
    storage: S,
    transfer: T,
    bucket: String,
    part_size: u64,
    verbose: bool,
}

impl<S: ObjectStorage, T: PresignedTransfer> Benchmark<S, T> {
    /// Creates a benchmark using parts of `part_size` bytes.
    pub fn new(storage: S, transfer: T, bucket: impl Into<String>, part_size: u64) -> Self {
        Self {
            storage,
            transfer,
            bucket: bucket.into(),
            part_size,
            verbose: false,
        }
    }

    /// Logs per-part progress at INFO instead of DEBUG.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Uploads, downloads and verifies `input_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if any request fails, the encrypted size deviates
    /// from the theoretical size, or the checksums of both sides differ.
    #[instrument(skip(self), target = TRACING_TARGET_BENCHMARK, fields(bucket = %self.bucket, part_size = self.part_size))]
    pub async fn run(&self, input_path: &Path) -> Result<BenchmarkSummary> {
        let start = Instant::now();
        let unencrypted_size = check_input(input_path)?;
        let file_id = Uuid::new_v4().to_string();

        let upload = self.upload(input_path, &file_id, unencrypted_size).await?;
        let (download_times, checksums) = self
            .download(&file_id, upload.secret.clone(), upload.encrypted_size)
            .await?;

        if checksums != upload.checksums {
            return Err(Error::ChecksumMismatch {
                upload: upload.checksums.to_string(),
                download: checksums.to_string(),
            });
        }
        info!(
            target: TRACING_TARGET_BENCHMARK,
            sha256 = %checksums.unencrypted_sha256(),
            parts = checksums.encrypted_sha256().len(),
            "Checksums of upload and download match"
        );

        Ok(BenchmarkSummary {
            elapsed: start.elapsed(),
            upload_times: upload.times,
            download_times,
            file_id,
            original_path: resolve_path(input_path),
            part_size: self.part_size,
            unencrypted_size,
            encrypted_size: upload.encrypted_size,
            secret_base64: upload.secret.to_base64(),
        })
    }

    async fn upload(&self, input_path: &Path, key: &str, unencrypted_size: u64) -> Result<Upload> {
        let upload_id = self.storage.create_multipart_upload(&self.bucket, key).await?;
        info!(
            target: TRACING_TARGET_BENCHMARK,
            key,
            upload_id = %upload_id,
            "Multipart upload started"
        );

        let result = async {
            let (upload, parts) = self
                .upload_parts(input_path, key, &upload_id, unencrypted_size)
                .await?;
            self.storage
                .complete_multipart_upload(&self.bucket, key, &upload_id, &parts)
                .await?;
            Ok::<_, Error>(upload)
        }
        .await;

        if result.is_err() {
            if let Err(e) = self
                .storage
                .abort_multipart_upload(&self.bucket, key, &upload_id)
                .await
            {
                warn!(target: TRACING_TARGET_BENCHMARK, error = %e, "Failed to abort multipart upload");
            }
        }
        result
    }

    async fn upload_parts(
        &self,
        input_path: &Path,
        key: &str,
        upload_id: &str,
        unencrypted_size: u64,
    ) -> Result<(Upload, Vec<UploadedPart>)> {
        let expected_size = encrypted_size(unencrypted_size);
        let total = part_count(expected_size, self.part_size);
        let reader = BufReader::new(File::open(input_path)?);
        let mut encryptor = Encryptor::new(reader, self.part_size as usize);
        let mut parts = Vec::new();
        let mut times = Vec::new();

        for part_number in 1.. {
            let Some(part) = encryptor.next_part()? else {
                break;
            };

            let url = self
                .storage
                .presigned_upload_part_url(&self.bucket, key, upload_id, part_number, PRESIGNED_URL_EXPIRATION)
                .await?;

            let size = part.len();
            let started = Instant::now();
            let etag = self.transfer.put_part(&url, part).await?;
            let elapsed = started.elapsed();

            self.log_part(&format!(
                "UPLOAD: Processing Part No. {part_number}/{total} ({:.2} MiB/s)",
                mib_per_second(size, elapsed)
            ));
            times.push(elapsed);
            parts.push(UploadedPart::new(part_number, etag));
        }

        let actual_size = encryptor.encrypted_size();
        if actual_size != expected_size {
            return Err(testbed_core::Error::EncryptedSizeMismatch {
                expected: expected_size,
                actual: actual_size,
            }
            .into());
        }

        let upload = Upload {
            times,
            secret: encryptor.secret().clone(),
            checksums: encryptor.checksums().clone(),
            encrypted_size: actual_size,
        };
        Ok((upload, parts))
    }

    async fn download(
        &self,
        key: &str,
        secret: FileSecret,
        encrypted_size: u64,
    ) -> Result<(Vec<Duration>, Checksums)> {
        let url = self
            .storage
            .presigned_download_url(&self.bucket, key, PRESIGNED_URL_EXPIRATION)
            .await?;

        let ranges = part_ranges(encrypted_size, self.part_size);
        let total = ranges.len();
        let mut decryptor = Decryptor::new(secret);
        let mut times = Vec::with_capacity(total);

        for (index, range) in ranges.into_iter().enumerate() {
            let started = Instant::now();
            let part = self.transfer.get_range(&url, range).await?;
            let elapsed = started.elapsed();

            decryptor.push(&part)?;
            self.log_part(&format!(
                "DOWNLOAD: Downloading Part No. {}/{total} ({:.2} MiB/s)",
                index + 1,
                mib_per_second(part.len(), elapsed)
            ));
            times.push(elapsed);
        }

        let (_, checksums) = decryptor.finish()?;
        Ok((times, checksums))
    }

    fn log_part(&self, line: &str) {
        if self.verbose {
            info!(target: TRACING_TARGET_BENCHMARK, "{line}");
        } else {
            debug!(target: TRACING_TARGET_BENCHMARK, "{line}");
        }
    }
}

/// Returns the size of the input file, failing on missing files and directories.
fn check_input(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        testbed_core::Error::InvalidInput(format!("No such file: {}", path.display()))
    })?;

    if metadata.is_dir() {
        return Err(testbed_core::Error::InvalidInput(format!(
            "File location points to a directory: {}",
            path.display()
        ))
        .into());
    }
    if metadata.len() == 0 {
        return Err(testbed_core::Error::InvalidInput(format!("File is empty: {}", path.display())).into());
    }

    Ok(metadata.len())
}

fn resolve_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Validates the input, sizes the parts, connects and runs the benchmark.
///
/// # Errors
///
/// Returns an error if the input is unusable, no part size fits, the client
/// cannot be created or the run fails.
pub async fn run_benchmark(
    input_path: &Path,
    config: &UploadConfig,
    verbose: bool,
) -> Result<BenchmarkSummary> {
    let file_size = check_input(input_path)?;
    let part_size = adjust_part_size(config.part_size, file_size)?;

    let client = StorageClient::connect(&config.s3_endpoint_url, &config.s3_region, &config.account()).await?;
    let transfer = client.transfer().clone();

    let summary = Benchmark::new(client, transfer, config.bucket_id.clone(), part_size)
        .verbose(verbose)
        .run(input_path)
        .await?;
    summary.log();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rand::RngCore;
    use testbed_core::crypto::{CIPHER_SEGMENT_SIZE, SEGMENT_SIZE};
    use url::Url;

    use super::*;
    use crate::testing::{Fault, FaultyTransfer, MemoryBackend, allow_all};

    fn input_file(size: usize) -> tempfile::NamedTempFile {
        let mut content = vec![0u8; size];
        rand::rng().fill_bytes(&mut content);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();
        file
    }

    fn upload_config() -> UploadConfig {
        UploadConfig {
            s3_endpoint_url: Url::parse("http://localhost:4566").unwrap(),
            s3_access_key_id: "AKIA0001".to_string(),
            s3_secret_access_key: "secret".to_string(),
            bucket_id: "benchmark".to_string(),
            part_size: 16,
            s3_region: "us-east-1".to_string(),
        }
    }

    #[tokio::test]
    async fn round_trip_records_one_time_per_part() {
        let input = input_file(300_000);
        let backend = MemoryBackend::new(allow_all());
        let client = backend.client("benchmark");

        let summary = Benchmark::new(client.clone(), client, "benchmark", 100_000)
            .verbose(true)
            .run(input.path())
            .await
            .unwrap();

        // five segments of 28 bytes overhead each
        assert_eq!(summary.unencrypted_size, 300_000);
        assert_eq!(summary.encrypted_size, 300_140);
        assert_eq!(summary.upload_times.len(), 4);
        assert_eq!(summary.download_times.len(), 4);
        assert!(summary.size_change_percent() > 0.0);

        let stored = backend.object("benchmark", &summary.file_id).unwrap();
        assert_eq!(stored.len() as u64, summary.encrypted_size);
        assert_eq!(backend.pending_uploads(), 0);
        assert_eq!(summary.original_path, std::fs::canonicalize(input.path()).unwrap());
    }

    #[tokio::test]
    async fn failed_part_aborts_the_upload() {
        let input = input_file(300_000);
        let backend = MemoryBackend::new(allow_all());
        let client = backend.client("benchmark");
        let transfer = FaultyTransfer::new(client.clone(), Fault::FailPart(2));

        let error = Benchmark::new(client, transfer, "benchmark", 100_000)
            .run(input.path())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Storage(ref e) if e.status() == Some(500)));
        assert_eq!(backend.pending_uploads(), 0);
        assert_eq!(backend.object_count(), 0);
    }

    #[tokio::test]
    async fn swapped_download_parts_fail_the_comparison() {
        // one cipher segment per part, so swapped parts still decrypt
        let input = input_file(3 * SEGMENT_SIZE);
        let backend = MemoryBackend::new(allow_all());
        let client = backend.client("benchmark");
        let transfer = FaultyTransfer::new(client.clone(), Fault::SwapFirstRanges);

        let error = Benchmark::new(client, transfer, "benchmark", CIPHER_SEGMENT_SIZE as u64)
            .run(input.path())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_input_fails_before_connecting() {
        let error = run_benchmark(Path::new("/nonexistent/input.bin"), &upload_config(), false)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("No such file: /nonexistent/input.bin"));
    }

    #[tokio::test]
    async fn directory_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let error = run_benchmark(dir.path(), &upload_config(), false)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("File location points to a directory"));
    }

    #[test]
    fn part_time_stats_of_empty_list() {
        assert!(part_time_stats(&[]).is_none());

        let times = [Duration::from_millis(10), Duration::from_millis(30)];
        let (average, fastest, slowest) = part_time_stats(&times).unwrap();
        assert_eq!(average, Duration::from_millis(20));
        assert_eq!(fastest, Duration::from_millis(10));
        assert_eq!(slowest, Duration::from_millis(30));
    }
}
