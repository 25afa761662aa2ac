//! YAML configuration for the test bed commands.
//!
//! Every command is driven by one YAML document:
//!
//! ```text
//! StorageConfig   # validate-storage-permissions: master/ifrs/dcs accounts, three buckets
//! DownloadConfig  # validate-download: upload and download accounts, one bucket
//! UploadConfig    # benchmark-upload: one set of credentials, one bucket
//! ```
//!
//! Loading is all-or-nothing: the file is read, parsed and validated before
//! any object storage client is created, so a bad field surfaces as an
//! [`Error::Config`] instead of a failed S3 request later on.

mod account;
mod download;
mod storage;
mod upload;

use std::borrow::Cow;
use std::fs;
use std::path::Path;

pub use account::AccountConfig;
pub use download::DownloadConfig;
use serde::de::DeserializeOwned;
pub use storage::StorageConfig;
pub use upload::UploadConfig;
use url::Url;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::{Error, Result, TRACING_TARGET_CONFIG};

/// Default region passed to the S3 client; S3-compatible stores ignore it.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default lifetime of generated presigned URLs in seconds.
pub const DEFAULT_PRESIGNED_URL_EXPIRATION: u64 = 60;

/// A configuration document that can be loaded from YAML.
pub trait ConfigFile: DeserializeOwned + Validate {
    /// Short name used in log and error messages.
    const KIND: &'static str;

    /// Cross-field checks that the field validators cannot express.
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Loads and validates a configuration document.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read, is not valid YAML,
/// lacks a required field, has a field of the wrong type, or fails validation.
pub fn load_config<T: ConfigFile>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .map_err(|e| Error::config(path, format!("cannot read file: {e}")))?;

    let config: T = serde_yaml::from_str(&content)
        .map_err(|e| Error::config(path, format!("invalid {} config: {e}", T::KIND)))?;

    config
        .validate()
        .map_err(|e| Error::config(path, format_validation_errors(&e)))?;
    config.check().map_err(|e| Error::config(path, e))?;

    tracing::debug!(
        target: TRACING_TARGET_CONFIG,
        path = %path.display(),
        kind = T::KIND,
        "Configuration loaded"
    );

    Ok(config)
}

/// Validates that an endpoint is an absolute HTTP(S) URL with a host.
pub(crate) fn check_endpoint(field: &str, endpoint: &Url) -> std::result::Result<(), String> {
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(format!(
            "Field '{field}' must use http or https, got '{}'",
            endpoint.scheme()
        ));
    }

    if endpoint.host().is_none() {
        return Err(format!("Field '{field}' must include a hostname"));
    }

    Ok(())
}

/// Flattens nested validation errors into one readable line.
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_validation_errors("", errors, &mut messages);
    messages.sort();
    messages.join("; ")
}

fn collect_validation_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|e| format_field_error(&path, e)));
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_errors(&path, nested, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_errors(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

fn format_field_error(field: &str, error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return format!("Field '{field}': {message}");
    }

    let bound = |name: &'static str| {
        error
            .params
            .get(&Cow::Borrowed(name))
            .map(ToString::to_string)
    };

    match (error.code.as_ref(), bound("min"), bound("max")) {
        ("length", Some(min), _) => format!("Field '{field}' must be at least {min} characters long"),
        ("range", Some(min), Some(max)) => {
            format!("Field '{field}' must be between {min} and {max}")
        }
        ("range", Some(min), None) => format!("Field '{field}' must be at least {min}"),
        ("range", None, Some(max)) => format!("Field '{field}' must be at most {max}"),
        (code, ..) => format!("Field '{field}' failed validation: {code}"),
    }
}
