//! Account credentials for one IAM principal.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Credentials of one storage account.
///
/// Each account is used to build its own object storage client. The secret
/// never appears in `Debug` output and is not serialized back out.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AccountConfig {
    /// Display name used in log lines, e.g. `ifrs`.
    #[validate(length(min = 1))]
    pub name: String,

    /// Access key id of the account.
    #[validate(length(min = 1))]
    pub access_key_id: String,

    /// Secret access key of the account.
    #[serde(skip_serializing)]
    #[validate(length(min = 1))]
    pub secret_access_key: String,
}

impl AccountConfig {
    /// Creates account credentials.
    pub fn new(
        name: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Returns a masked version of the access key id for logging.
    ///
    /// This shows only the first 4 characters followed by asterisks.
    pub fn access_key_masked(&self) -> String {
        mask_secret(&self.access_key_id)
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("name", &self.name)
            .field("access_key_id", &self.access_key_masked())
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Masks all but the first four characters of a credential.
pub(crate) fn mask_secret(value: &str) -> String {
    match value.char_indices().nth(4) {
        Some((idx, _)) => format!("{}***", &value[..idx]),
        None => "*".repeat(value.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_is_masked() {
        let account = AccountConfig::new("ifrs", "AKIATEST12345", "secret");
        assert_eq!(account.access_key_masked(), "AKIA***");

        let short = AccountConfig::new("dcs", "ABC", "secret");
        assert_eq!(short.access_key_masked(), "***");
    }

    #[test]
    fn debug_hides_secret() {
        let account = AccountConfig::new("master", "AKIATEST12345", "topsecret");
        let debug = format!("{account:?}");
        assert!(debug.contains("master"));
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("AKIATEST12345"));
    }

    #[test]
    fn empty_credentials_fail_validation() {
        let account = AccountConfig::new("master", "", "secret");
        assert!(account.validate().is_err());
    }
}
