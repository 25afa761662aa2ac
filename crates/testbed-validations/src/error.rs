//! Error type for the validation runs.

use testbed_storage::StorageError;

/// Error that aborts a validation run.
///
/// Permission denials during the storage validation are outcomes, not errors;
/// this type only covers failures that leave a run unable to continue.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum Error {
    /// Configuration, input, part sizing or encryption failed.
    #[error(transparent)]
    Core(#[from] testbed_core::Error),

    /// An object storage request failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Downloaded content does not match the uploaded content.
    #[error("Checksum mismatch between upload ({upload}) and download ({download})")]
    ChecksumMismatch {
        /// Checksums recorded while uploading.
        upload: String,
        /// Checksums recorded while downloading.
        download: String,
    },

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specialized [`Result`] type for validation runs.
pub type Result<T, E = Error> = std::result::Result<T, E>;
