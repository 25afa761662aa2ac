//! Storage permission validation across accounts and buckets.
//!
//! The master account first uploads a test object into every bucket. Each
//! account then runs every operation of the permission matrix against every
//! bucket, and each result is classified against the matrix. Checks that
//! depend on a failed setup step are recorded as skipped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use strum::IntoEnumIterator;
use testbed_core::StorageConfig;
use testbed_storage::{ObjectStorage, StorageClient};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::permissions::{
    Account, BucketRole, COPY_PAIRS, CheckOutcome, Operation, Report, copy_allowed, is_allowed,
};
use crate::testfile::TestFile;
use crate::{Result, TRACING_TARGET_STORAGE};

const DELETE_FIXTURE_BODY: &[u8] = b"delete permission fixture";

/// Sizes, URL lifetime and scratch directory of a validation run.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Part size in bytes for uploads and copies.
    pub part_size: u64,
    /// Number of parts of each generated test file.
    pub part_count: u32,
    /// Lifetime of presigned URLs.
    pub expiration: Duration,
    /// Directory the test files are generated in.
    pub work_dir: PathBuf,
}

impl StorageSettings {
    /// Takes sizes and expiration from the configuration and uses the system temp dir.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            part_size: config.test_file_part_size,
            part_count: config.test_file_part_count,
            expiration: Duration::from_secs(config.presigned_url_expiration),
            work_dir: std::env::temp_dir(),
        }
    }

    fn test_file_size(&self) -> u64 {
        self.part_size * u64::from(self.part_count)
    }
}

/// Names of the three archive buckets.
#[derive(Debug, Clone)]
pub struct BucketNames {
    /// Bucket receiving submissions before they are validated.
    pub interrogation: String,
    /// Bucket holding archived files.
    pub permanent: String,
    /// Bucket files are served from for download.
    pub outbox: String,
}

impl BucketNames {
    /// Returns the bucket name playing `role`.
    pub fn name(&self, role: BucketRole) -> &str {
        match role {
            BucketRole::Interrogation => &self.interrogation,
            BucketRole::Permanent => &self.permanent,
            BucketRole::Outbox => &self.outbox,
        }
    }
}

impl From<&StorageConfig> for BucketNames {
    fn from(config: &StorageConfig) -> Self {
        Self {
            interrogation: config.interrogation_bucket.clone(),
            permanent: config.permanent_bucket.clone(),
            outbox: config.outbox_bucket.clone(),
        }
    }
}

/// Runs the permission checks for the master, ifrs and dcs accounts.
pub struct StorageValidator<S> {
    clients: [(Account, S); 3],
    buckets: BucketNames,
    settings: StorageSettings,
}

/// Key of the master's test object per bucket, or why it could not be uploaded.
type Sources = HashMap<BucketRole, std::result::Result<String, String>>;

impl<S: ObjectStorage> StorageValidator<S> {
    /// Creates a validator from one client per account.
    pub fn new(master: S, ifrs: S, dcs: S, buckets: BucketNames, settings: StorageSettings) -> Self {
        Self {
            clients: [
                (Account::Master, master),
                (Account::Ifrs, ifrs),
                (Account::Dcs, dcs),
            ],
            buckets,
            settings,
        }
    }

    fn master(&self) -> &S {
        &self.clients[0].1
    }

    /// Runs every check and returns the classified outcomes.
    ///
    /// # Errors
    ///
    /// Returns an error only if a local test file cannot be generated. Failed
    /// storage requests become outcomes in the report.
    #[instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    pub async fn run(&self) -> Result<Report> {
        let mut report = Report::new();
        let mut created = Vec::new();

        let files = self
            .clients
            .iter()
            .map(|(_, client)| {
                TestFile::zero_filled(
                    &self.settings.work_dir,
                    client.account(),
                    self.settings.test_file_size(),
                )
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        let sources = self.upload_sources(&files[0], &mut created).await;

        for ((account, client), file) in self.clients.iter().zip(&files) {
            info!(
                target: TRACING_TARGET_STORAGE,
                account = client.account(),
                "Checking bucket permissions"
            );
            for role in BucketRole::iter() {
                self.check_bucket(&mut report, *account, client, role, file, &sources, &mut created)
                    .await;
            }
        }

        for (account, client) in &self.clients {
            for (source, target) in COPY_PAIRS {
                self.check_copy(&mut report, *account, client, source, target, &sources, &mut created)
                    .await;
            }
        }

        for (account, client) in &self.clients {
            for role in BucketRole::iter() {
                self.check_delete(&mut report, *account, client, role, &mut created)
                    .await;
            }
        }

        self.clean_up(&created).await;
        report.log_summary();
        Ok(report)
    }

    async fn upload_sources(&self, file: &TestFile, created: &mut Vec<(String, String)>) -> Sources {
        let mut sources = Sources::new();
        let master = self.master();

        for role in BucketRole::iter() {
            let bucket = self.buckets.name(role);
            let key = format!("testbed_source_{}", Uuid::new_v4());
            info!(
                target: TRACING_TARGET_STORAGE,
                bucket,
                key = %key,
                "Uploading test object with master account"
            );

            created.push((bucket.to_string(), key.clone()));
            let result = master
                .upload_file_multipart(bucket, &key, file.path(), self.settings.part_size)
                .await;

            let source = match result {
                Ok(()) => Ok(key),
                Err(e) => {
                    error!(
                        target: TRACING_TARGET_STORAGE,
                        bucket,
                        account = master.account(),
                        error = %e,
                        "Setup upload of test object failed, dependent checks are skipped"
                    );
                    Err(format!("setup upload to \"{bucket}\" failed: {}", e.reason()))
                }
            };
            sources.insert(role, source);
        }

        sources
    }

    #[allow(clippy::too_many_arguments)]
    async fn check_bucket(
        &self,
        report: &mut Report,
        account: Account,
        client: &S,
        role: BucketRole,
        file: &TestFile,
        sources: &Sources,
        created: &mut Vec<(String, String)>,
    ) {
        let name = client.account();
        let bucket = self.buckets.name(role);

        let result = client.head_bucket(bucket).await;
        let expected = is_allowed(account, role, Operation::HeadBucket);
        report.record(CheckOutcome::evaluate(name, Operation::HeadBucket, bucket, None, expected, &result));

        let result = client.list_objects(bucket).await;
        let expected = is_allowed(account, role, Operation::ListObjects);
        report.record(CheckOutcome::evaluate(name, Operation::ListObjects, bucket, None, expected, &result));

        created.push((bucket.to_string(), file.key().to_string()));
        let result = client
            .upload_file_multipart(bucket, file.key(), file.path(), self.settings.part_size)
            .await;
        let expected = is_allowed(account, role, Operation::MultipartUpload);
        report.record(CheckOutcome::evaluate(
            name,
            Operation::MultipartUpload,
            bucket,
            Some(file.key()),
            expected,
            &result,
        ));

        let expected = is_allowed(account, role, Operation::PresignedDownload);
        let outcome = match &sources[&role] {
            Ok(key) => {
                let result = client
                    .check_presigned_download(bucket, key, self.settings.expiration)
                    .await;
                CheckOutcome::evaluate(name, Operation::PresignedDownload, bucket, Some(key), expected, &result)
            }
            Err(reason) => CheckOutcome::skipped(name, Operation::PresignedDownload, bucket, reason.as_str()),
        };
        report.record(outcome);
    }

    #[allow(clippy::too_many_arguments)]
    async fn check_copy(
        &self,
        report: &mut Report,
        account: Account,
        client: &S,
        source: BucketRole,
        target: BucketRole,
        sources: &Sources,
        created: &mut Vec<(String, String)>,
    ) {
        let name = client.account();
        let source_bucket = self.buckets.name(source);
        let target_bucket = self.buckets.name(target);
        let label = format!("{source_bucket} -> {target_bucket}");

        let source_key = match &sources[&source] {
            Ok(key) => key,
            Err(reason) => {
                report.record(CheckOutcome::skipped(name, Operation::MultipartCopy, label, reason.as_str()));
                return;
            }
        };

        let target_key = format!("{source_key}_copy_{name}");
        created.push((target_bucket.to_string(), target_key.clone()));
        let result = client
            .copy_object_multipart(
                source_bucket,
                source_key,
                target_bucket,
                &target_key,
                self.settings.part_size,
            )
            .await;

        let expected = copy_allowed(account, source, target);
        report.record(CheckOutcome::evaluate(name, Operation::MultipartCopy, label, None, expected, &result));
    }

    async fn check_delete(
        &self,
        report: &mut Report,
        account: Account,
        client: &S,
        role: BucketRole,
        created: &mut Vec<(String, String)>,
    ) {
        let name = client.account();
        let bucket = self.buckets.name(role);
        let key = format!("testbed_delete_{name}_{}", Uuid::new_v4());

        created.push((bucket.to_string(), key.clone()));
        if let Err(e) = self
            .master()
            .put_object(bucket, &key, Bytes::from_static(DELETE_FIXTURE_BODY))
            .await
        {
            error!(
                target: TRACING_TARGET_STORAGE,
                bucket,
                key = %key,
                error = %e,
                "Setup upload of delete fixture failed"
            );
            let reason = format!("setup upload to \"{bucket}\" failed: {}", e.reason());
            report.record(CheckOutcome::skipped(name, Operation::DeleteObject, bucket, reason));
            return;
        }

        let result = client.delete_object(bucket, &key).await;
        let expected = is_allowed(account, role, Operation::DeleteObject);
        report.record(CheckOutcome::evaluate(
            name,
            Operation::DeleteObject,
            bucket,
            Some(&key),
            expected,
            &result,
        ));
    }

    /// Deletes every object the run may have created, using the master account.
    async fn clean_up(&self, created: &[(String, String)]) {
        let master = self.master();
        for (bucket, key) in created {
            if let Err(e) = master.delete_object(bucket, key).await {
                warn!(
                    target: TRACING_TARGET_STORAGE,
                    bucket = %bucket,
                    key = %key,
                    error = %e,
                    "Failed to remove test object"
                );
            }
        }
    }
}

/// Connects the three accounts and runs the permission validation.
///
/// # Errors
///
/// Returns an error if a client cannot be created or a test file cannot be
/// generated.
pub async fn run_storage_validation(config: &StorageConfig) -> Result<Report> {
    let endpoint = &config.s3_url_endpoint;
    let region = &config.s3_region;

    let master = StorageClient::connect(endpoint, region, &config.master_account).await?;
    let ifrs = StorageClient::connect(endpoint, region, &config.ifrs_account).await?;
    let dcs = StorageClient::connect(endpoint, region, &config.dcs_account).await?;

    let validator = StorageValidator::new(
        master,
        ifrs,
        dcs,
        BucketNames::from(config),
        StorageSettings::from_config(config),
    );
    validator.run().await
}
