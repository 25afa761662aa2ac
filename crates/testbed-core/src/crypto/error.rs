//! Cryptographic error types.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during segment encryption and decryption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The cipher segment is too short to contain a valid nonce and tag.
    #[error("cipher segment too short to contain nonce and authentication tag")]
    SegmentTooShort,
    /// The plain segment exceeds the segment size.
    #[error("plain segment of {0} bytes exceeds the segment size")]
    SegmentTooLarge(usize),
    /// Encryption of a segment failed.
    #[error("segment encryption failed")]
    EncryptionFailed,
    /// Decryption failed - data may be corrupted or tampered with.
    #[error("decryption failed: data may be corrupted or tampered with")]
    DecryptionFailed,
    /// The provided secret has an invalid length.
    #[error("invalid secret length: expected 32 bytes")]
    InvalidKeyLength,
}
