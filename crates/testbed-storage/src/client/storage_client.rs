//! aws-sdk-s3 client bound to one account.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, RequestChecksumCalculation, ResponseChecksumValidation};
use testbed_core::AccountConfig;
use tracing::{info, instrument};
use url::Url;

use crate::transfer::HttpTransfer;
use crate::{Result, TRACING_TARGET_CLIENT};

/// Name reported by the static credentials provider.
const CREDENTIALS_PROVIDER: &str = "datahub-test-bed";

/// S3 client signing every request as one account.
///
/// Uses path-style addressing and only computes request checksums when an
/// operation requires them, which S3-compatible stores such as Ceph expect.
#[derive(Clone)]
pub struct StorageClient {
    inner: Client,
    account: Arc<str>,
    access_key_masked: Arc<str>,
    endpoint: Url,
    transfer: HttpTransfer,
}

impl StorageClient {
    /// Builds a client for `account` against `endpoint`.
    ///
    /// No request is sent; invalid credentials only surface on the first
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Config`] if the HTTP transfer client
    /// cannot be created.
    #[instrument(
        skip(endpoint, account),
        target = TRACING_TARGET_CLIENT,
        fields(endpoint = %endpoint, account = %account.name)
    )]
    pub async fn connect(endpoint: &Url, region: &str, account: &AccountConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &account.access_key_id,
            &account.secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
            .build();

        let client = Self {
            inner: Client::from_conf(s3_config),
            account: Arc::from(account.name.as_str()),
            access_key_masked: Arc::from(account.access_key_masked()),
            endpoint: endpoint.clone(),
            transfer: HttpTransfer::new()?,
        };

        info!(
            target: TRACING_TARGET_CLIENT,
            account = %client.account,
            access_key = %client.access_key_masked,
            region = %region,
            "Storage client initialized"
        );

        Ok(client)
    }

    /// Returns the name of the account this client signs as.
    #[inline]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns the HTTP client used for presigned URL transfers.
    #[inline]
    pub fn transfer(&self) -> &HttpTransfer {
        &self.transfer
    }

    /// Returns a reference to the inner SDK client.
    #[inline]
    pub(crate) fn as_inner(&self) -> &Client {
        &self.inner
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("account", &self.account)
            .field("access_key", &self.access_key_masked)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ObjectStorage;

    async fn local_client() -> StorageClient {
        let endpoint = Url::parse("http://localhost:4566").unwrap();
        let account = AccountConfig::new("ifrs", "AKIATESTKEY", "secret");
        StorageClient::connect(&endpoint, "us-east-1", &account)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn debug_masks_access_key() {
        let client = local_client().await;
        let debug = format!("{client:?}");
        assert!(debug.contains("ifrs"));
        assert!(!debug.contains("AKIATESTKEY"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn presigned_url_uses_path_style() {
        let client = local_client().await;
        let url = client
            .presigned_download_url("outbox", "object", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:4566/outbox/object?"));
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
