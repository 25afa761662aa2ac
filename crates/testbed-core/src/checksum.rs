//! Checksums of plain content and encrypted parts.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::Result;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Running checksums of one transfer.
///
/// Holds a SHA-256 over the whole unencrypted content plus one SHA-256 and one
/// MD5 per encrypted part. Both sides of a benchmark build one of these and compare
/// them once the download finished.
#[derive(Clone, Default)]
pub struct Checksums {
    unencrypted: Sha256,
    encrypted_parts: Vec<String>,
    encrypted_parts_md5: Vec<String>,
}

impl Checksums {
    /// Creates empty checksums.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds unencrypted content into the running digest.
    pub fn update_unencrypted(&mut self, data: &[u8]) {
        self.unencrypted.update(data);
    }

    /// Records the digest of one encrypted part.
    pub fn update_encrypted(&mut self, part: &[u8]) {
        self.encrypted_parts.push(hex::encode(Sha256::digest(part)));
        self.encrypted_parts_md5.push(hex::encode(Md5::digest(part)));
    }

    /// Returns the hex SHA-256 of all unencrypted content seen so far.
    pub fn unencrypted_sha256(&self) -> String {
        hex::encode(self.unencrypted.clone().finalize())
    }

    /// Returns the hex SHA-256 of every encrypted part, in part order.
    pub fn encrypted_sha256(&self) -> &[String] {
        &self.encrypted_parts
    }

    /// Returns the hex MD5 of every encrypted part, in part order.
    pub fn encrypted_md5(&self) -> &[String] {
        &self.encrypted_parts_md5
    }
}

impl PartialEq for Checksums {
    fn eq(&self, other: &Self) -> bool {
        self.encrypted_parts == other.encrypted_parts
            && self.encrypted_parts_md5 == other.encrypted_parts_md5
            && self.unencrypted_sha256() == other.unencrypted_sha256()
    }
}

impl Eq for Checksums {}

impl fmt::Debug for Checksums {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checksums")
            .field("unencrypted_sha256", &self.unencrypted_sha256())
            .field("encrypted_sha256", &self.encrypted_parts)
            .field("encrypted_md5", &self.encrypted_parts_md5)
            .finish()
    }
}

impl fmt::Display for Checksums {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unencrypted: {}, encrypted parts: [{}]",
            self.unencrypted_sha256(),
            self.encrypted_parts.join(", ")
        )
    }
}

/// Computes the hex SHA-256 of a file without loading it into memory.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the file cannot be opened or read.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
