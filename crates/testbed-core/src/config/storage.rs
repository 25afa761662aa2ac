//! Configuration of the storage permission validator.

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::{
    AccountConfig, ConfigFile, DEFAULT_PRESIGNED_URL_EXPIRATION, DEFAULT_REGION, check_endpoint,
};
use crate::MIB;

/// Default part size of the generated test files (15 MiB).
pub const DEFAULT_TEST_FILE_PART_SIZE: u64 = 15 * MIB;

/// Default number of parts of the generated test files.
pub const DEFAULT_TEST_FILE_PART_COUNT: u32 = 2;

/// Accounts and buckets exercised by the permission validator.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageConfig {
    /// Endpoint of the S3-compatible object storage.
    pub s3_url_endpoint: Url,

    /// Region passed to the S3 client.
    #[serde(default = "default_region")]
    #[validate(length(min = 1))]
    pub s3_region: String,

    /// Administrative account with full access to every bucket.
    #[validate(nested)]
    pub master_account: AccountConfig,

    /// Account of the internal file registry service.
    #[validate(nested)]
    pub ifrs_account: AccountConfig,

    /// Account of the download controller service.
    #[validate(nested)]
    pub dcs_account: AccountConfig,

    /// Bucket holding files under interrogation.
    #[validate(length(min = 1))]
    pub interrogation_bucket: String,

    /// Bucket holding permanently archived files.
    #[validate(length(min = 1))]
    pub permanent_bucket: String,

    /// Bucket staging files for download.
    #[validate(length(min = 1))]
    pub outbox_bucket: String,

    /// Part size in bytes of the generated test files.
    #[serde(default = "default_part_size")]
    #[validate(range(min = 5242880, max = 5368709120u64))]
    pub test_file_part_size: u64,

    /// Number of parts of the generated test files.
    #[serde(default = "default_part_count")]
    #[validate(range(min = 1, max = 10000))]
    pub test_file_part_count: u32,

    /// Lifetime of presigned URLs in seconds.
    #[serde(default = "default_expiration")]
    #[validate(range(min = 1, max = 604800))]
    pub presigned_url_expiration: u64,
}

impl StorageConfig {
    /// Returns the size in bytes of a generated test file.
    pub fn test_file_size(&self) -> u64 {
        self.test_file_part_size * u64::from(self.test_file_part_count)
    }
}

impl ConfigFile for StorageConfig {
    const KIND: &'static str = "storage";

    fn check(&self) -> Result<(), String> {
        check_endpoint("s3_url_endpoint", &self.s3_url_endpoint)?;

        let buckets = [
            &self.interrogation_bucket,
            &self.permanent_bucket,
            &self.outbox_bucket,
        ];
        if buckets[0] == buckets[1] || buckets[0] == buckets[2] || buckets[1] == buckets[2] {
            return Err("interrogation, permanent and outbox buckets must be distinct".to_string());
        }

        Ok(())
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

const fn default_part_size() -> u64 {
    DEFAULT_TEST_FILE_PART_SIZE
}

const fn default_part_count() -> u32 {
    DEFAULT_TEST_FILE_PART_COUNT
}

const fn default_expiration() -> u64 {
    DEFAULT_PRESIGNED_URL_EXPIRATION
}
