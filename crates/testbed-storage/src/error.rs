//! Error type for object storage operations.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Error type for object storage operations.
///
/// Permission checks turn these into outcomes, so every variant can produce
/// a short [`reason`](StorageError::reason) for the log line.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum StorageError {
    /// An S3 API request was rejected or could not be sent.
    #[error("{operation} failed: {reason}")]
    Service {
        /// Name of the S3 operation, e.g. `HeadBucket`.
        operation: &'static str,
        /// Error code and message reported by the server.
        reason: String,
        /// HTTP status of the response, if one was received.
        status: Option<u16>,
    },

    /// A presigned URL request returned a non-success status.
    #[error("Unexpected HTTP status {status}: {reason}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Error code parsed from the response body, or the status text.
        reason: String,
    },

    /// HTTP transport failed before a response was received.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request could not be built from the given arguments.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client could not be created.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Wraps an SDK error, keeping the S3 error code, message and status.
    pub(crate) fn service<E>(operation: &'static str, error: SdkError<E, HttpResponse>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let status = error.raw_response().map(|r| r.status().as_u16());
        let reason = describe(error.code(), error.message(), status)
            .unwrap_or_else(|| DisplayErrorContext(&error).to_string());

        Self::Service {
            operation,
            reason,
            status,
        }
    }

    /// Returns the short failure reason used in outcome log lines.
    pub fn reason(&self) -> String {
        match self {
            Self::Service { reason, .. } | Self::UnexpectedStatus { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Returns the HTTP status of the failed request, if known.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => *status,
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Http(error) => error.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns whether the server denied access to the resource.
    pub fn is_access_denied(&self) -> bool {
        if self.status() == Some(403) {
            return true;
        }
        let reason = self.reason();
        reason.contains("AccessDenied") || reason.contains("Forbidden")
    }
}

/// Builds a reason from whatever the server reported.
///
/// Prefers `code: message`, then either part alone, then the HTTP status.
pub(crate) fn describe(
    code: Option<&str>,
    message: Option<&str>,
    status: Option<u16>,
) -> Option<String> {
    match (code, message, status) {
        (Some(code), Some(message), _) if code != message => Some(format!("{code}: {message}")),
        (Some(code), _, _) => Some(code.to_string()),
        (None, Some(message), _) => Some(message.to_string()),
        (None, None, Some(status)) => Some(status_reason(status)),
        (None, None, None) => None,
    }
}

/// Describes a bare HTTP status, naming the statuses S3 uses for denials.
pub(crate) fn status_reason(status: u16) -> String {
    match status {
        403 => "Forbidden (HTTP 403)".to_string(),
        404 => "Not Found (HTTP 404)".to_string(),
        other => format!("HTTP {other}"),
    }
}

/// Specialized [`Result`] type for object storage operations.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_prefers_code_and_message() {
        assert_eq!(
            describe(Some("AccessDenied"), Some("Access Denied"), Some(403)).as_deref(),
            Some("AccessDenied: Access Denied")
        );
        assert_eq!(
            describe(Some("NoSuchBucket"), None, Some(404)).as_deref(),
            Some("NoSuchBucket")
        );
        assert_eq!(
            describe(None, None, Some(403)).as_deref(),
            Some("Forbidden (HTTP 403)")
        );
        assert_eq!(describe(None, None, None), None);
    }

    #[test]
    fn access_denied_is_detected() {
        let error = StorageError::Service {
            operation: "HeadBucket",
            reason: "Forbidden (HTTP 403)".to_string(),
            status: Some(403),
        };
        assert!(error.is_access_denied());

        let error = StorageError::UnexpectedStatus {
            status: 400,
            reason: "AccessDenied".to_string(),
        };
        assert!(error.is_access_denied());

        let error = StorageError::Service {
            operation: "ListObjectsV2",
            reason: "NoSuchBucket".to_string(),
            status: Some(404),
        };
        assert!(!error.is_access_denied());
    }

    #[test]
    fn reason_is_short_for_service_errors() {
        let error = StorageError::Service {
            operation: "DeleteObject",
            reason: "AccessDenied: Access Denied".to_string(),
            status: Some(403),
        };
        assert_eq!(error.reason(), "AccessDenied: Access Denied");
        assert_eq!(
            error.to_string(),
            "DeleteObject failed: AccessDenied: Access Denied"
        );

        let error = StorageError::InvalidRequest("empty key".to_string());
        assert_eq!(error.reason(), "Invalid request: empty key");
    }
}
