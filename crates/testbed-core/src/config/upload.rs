//! Configuration of the encrypted upload/download benchmark.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::account::mask_secret;
use super::{AccountConfig, ConfigFile, DEFAULT_REGION, check_endpoint};

/// Default upload part size in MiB.
pub const DEFAULT_PART_SIZE_MIB: u64 = 16;

/// Endpoint, credentials and bucket used by the benchmark.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct UploadConfig {
    /// Endpoint of the S3-compatible object storage.
    pub s3_endpoint_url: Url,

    /// Access key id for the object storage.
    #[validate(length(min = 1))]
    pub s3_access_key_id: String,

    /// Secret access key for the object storage.
    #[serde(skip_serializing)]
    #[validate(length(min = 1))]
    pub s3_secret_access_key: String,

    /// Bucket the encrypted file is uploaded to.
    #[validate(length(min = 1))]
    pub bucket_id: String,

    /// Upload part size in MiB. Clamped to 5..=5120 before use.
    #[serde(default = "default_part_size")]
    #[validate(range(min = 1))]
    pub part_size: u64,

    /// Region passed to the S3 client.
    #[serde(default = "default_region")]
    #[validate(length(min = 1))]
    pub s3_region: String,
}

impl UploadConfig {
    /// Returns the credentials as an account named `benchmark`.
    pub fn account(&self) -> AccountConfig {
        AccountConfig::new(
            "benchmark",
            self.s3_access_key_id.clone(),
            self.s3_secret_access_key.clone(),
        )
    }
}

impl ConfigFile for UploadConfig {
    const KIND: &'static str = "upload";

    fn check(&self) -> Result<(), String> {
        check_endpoint("s3_endpoint_url", &self.s3_endpoint_url)
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("s3_endpoint_url", &self.s3_endpoint_url.as_str())
            .field("s3_access_key_id", &mask_secret(&self.s3_access_key_id))
            .field("s3_secret_access_key", &"[REDACTED]")
            .field("bucket_id", &self.bucket_id)
            .field("part_size", &self.part_size)
            .field("s3_region", &self.s3_region)
            .finish()
    }
}

const fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE_MIB
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}
