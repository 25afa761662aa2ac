//! Configuration of the presigned URL download validator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::{
    AccountConfig, ConfigFile, DEFAULT_PRESIGNED_URL_EXPIRATION, DEFAULT_REGION, check_endpoint,
};
use crate::MIB;

/// Default size of the generated test file (50 MiB).
pub const DEFAULT_TEST_FILE_SIZE: u64 = 50 * MIB;

/// Accounts, bucket and limits used by the download validator.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DownloadConfig {
    /// Endpoint of the S3-compatible object storage.
    pub s3_url_endpoint: Url,

    /// Region passed to the S3 client.
    #[serde(default = "default_region")]
    #[validate(length(min = 1))]
    pub s3_region: String,

    /// Account that uploads the test file.
    #[validate(nested)]
    pub account_for_upload: AccountConfig,

    /// Account that signs the download URL.
    #[validate(nested)]
    pub account_for_download: AccountConfig,

    /// Bucket the test object lives in.
    #[validate(length(min = 1))]
    pub bucket: String,

    /// Directory the downloaded file is written to.
    pub output_dir: PathBuf,

    /// Size in bytes of the generated test file.
    #[serde(default = "default_test_file_size")]
    #[validate(range(min = 1))]
    pub test_file_size: u64,

    /// Lifetime of the presigned URL in seconds.
    #[serde(default = "default_expiration")]
    #[validate(range(min = 1, max = 604800))]
    pub presigned_url_expiration: u64,
}

impl ConfigFile for DownloadConfig {
    const KIND: &'static str = "download";

    fn check(&self) -> Result<(), String> {
        check_endpoint("s3_url_endpoint", &self.s3_url_endpoint)?;

        if self.output_dir.as_os_str().is_empty() {
            return Err("Field 'output_dir' must not be empty".to_string());
        }

        Ok(())
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

const fn default_test_file_size() -> u64 {
    DEFAULT_TEST_FILE_SIZE
}

const fn default_expiration() -> u64 {
    DEFAULT_PRESIGNED_URL_EXPIRATION
}
