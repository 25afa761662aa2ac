//! ChaCha20-Poly1305 (IETF) segment encryption.
//!
//! Files are encrypted in independent segments in the Crypt4GH layout:
//!
//! ```text
//! plain segment:  up to 65 536 bytes
//! cipher segment: nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! Every segment gets its own random nonce, so a full plain segment grows by
//! exactly [`SEGMENT_OVERHEAD`] bytes.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};

use super::error::{CryptoError, CryptoResult};

/// Size of a plain segment in bytes.
pub const SEGMENT_SIZE: usize = 65_536;

/// Size of the IETF ChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Bytes added to every segment by encryption.
pub const SEGMENT_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Size of a full cipher segment in bytes.
pub const CIPHER_SEGMENT_SIZE: usize = SEGMENT_SIZE + SEGMENT_OVERHEAD;

/// Returns the encrypted size of `plain_size` bytes of content.
pub fn encrypted_size(plain_size: u64) -> u64 {
    let segments = plain_size.div_ceil(SEGMENT_SIZE as u64);
    plain_size + segments * SEGMENT_OVERHEAD as u64
}

/// Symmetric 256-bit secret used for every segment of one file.
#[derive(Clone, PartialEq, Eq)]
pub struct FileSecret([u8; 32]);

impl FileSecret {
    /// Generates a new random secret.
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Creates a secret from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless exactly 32 bytes are given.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self(key))
    }

    /// Returns the secret as standard base64, as printed in the summary.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new((&self.0).into())
    }
}

impl fmt::Debug for FileSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileSecret([REDACTED])")
    }
}

/// Encrypts one plain segment of at most [`SEGMENT_SIZE`] bytes.
pub fn encrypt_segment(secret: &FileSecret, segment: &[u8]) -> CryptoResult<Vec<u8>> {
    if segment.len() > SEGMENT_SIZE {
        return Err(CryptoError::SegmentTooLarge(segment.len()));
    }

    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = secret
        .cipher()
        .encrypt(&nonce, segment)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypts one cipher segment produced by [`encrypt_segment`].
///
/// # Errors
///
/// - [`CryptoError::SegmentTooShort`] if the segment cannot hold nonce and tag
/// - [`CryptoError::DecryptionFailed`] on a wrong secret or corrupted data
pub fn decrypt_segment(secret: &FileSecret, segment: &[u8]) -> CryptoResult<Vec<u8>> {
    if segment.len() < SEGMENT_OVERHEAD {
        return Err(CryptoError::SegmentTooShort);
    }

    let (nonce, ciphertext) = segment.split_at(NONCE_SIZE);
    secret
        .cipher()
        .decrypt(nonce.into(), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}
