//! Error type for configuration, checksum and encryption primitives.

use std::path::PathBuf;

use crate::crypto::CryptoError;

/// Error type for test bed core operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum Error {
    /// Configuration could not be loaded.
    ///
    /// Covers unreadable files, YAML syntax errors, missing or mistyped fields
    /// and failed field validation. The message names the file and the cause.
    #[error("Configuration error in {}: {message}", path.display())]
    Config {
        /// Path of the configuration file.
        path: PathBuf,
        /// Human readable cause.
        message: String,
    },

    /// Input file is missing or unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No part size satisfies the multipart part limit.
    #[error("Could not find a valid part size for a file of {file_size} bytes")]
    PartSize {
        /// Size of the file that could not be split.
        file_size: u64,
    },

    /// Encrypted output does not have the size predicted from the plaintext.
    #[error("Mismatch between actual and theoretical encrypted size: is {actual}, should be {expected}")]
    EncryptedSizeMismatch {
        /// Size computed from the plaintext size.
        expected: u64,
        /// Size actually produced.
        actual: u64,
    },

    /// Encryption or decryption failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a configuration error for the given file.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Specialized [`Result`] type for test bed core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
