//! On-the-fly decryption of downloaded parts.

use super::segment::{CIPHER_SEGMENT_SIZE, FileSecret, decrypt_segment};
use crate::Result;
use crate::checksum::Checksums;

/// Decrypts encrypted parts as they arrive and tracks their checksums.
///
/// Part boundaries do not line up with cipher segments, so incomplete
/// segments are carried over until the next part or [`Decryptor::finish`].
pub struct Decryptor {
    secret: FileSecret,
    checksums: Checksums,
    unprocessed: Vec<u8>,
}

impl Decryptor {
    /// Creates a decryptor for content encrypted with `secret`.
    pub fn new(secret: FileSecret) -> Self {
        Self {
            secret,
            checksums: Checksums::new(),
            unprocessed: Vec::new(),
        }
    }

    /// Processes one downloaded part and returns the plaintext it completed.
    ///
    /// # Errors
    ///
    /// Returns an error if a complete cipher segment fails to decrypt.
    pub fn push(&mut self, part: &[u8]) -> Result<Vec<u8>> {
        self.checksums.update_encrypted(part);
        self.unprocessed.extend_from_slice(part);

        let complete = self.unprocessed.len() / CIPHER_SEGMENT_SIZE * CIPHER_SEGMENT_SIZE;
        let mut plaintext = Vec::with_capacity(complete);
        for segment in self.unprocessed[..complete].chunks(CIPHER_SEGMENT_SIZE) {
            plaintext.extend(decrypt_segment(&self.secret, segment)?);
        }
        self.unprocessed.drain(..complete);

        self.checksums.update_unencrypted(&plaintext);
        Ok(plaintext)
    }

    /// Decrypts the dangling segment and returns the final checksums.
    ///
    /// # Errors
    ///
    /// Returns an error if the dangling segment fails to decrypt.
    pub fn finish(mut self) -> Result<(Vec<u8>, Checksums)> {
        let mut plaintext = Vec::new();
        if !self.unprocessed.is_empty() {
            plaintext = decrypt_segment(&self.secret, &self.unprocessed)?;
            self.checksums.update_unencrypted(&plaintext);
        }
        Ok((plaintext, self.checksums))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::crypto::Encryptor;

    #[test]
    fn roundtrip_matches_checksums() {
        let content: Vec<u8> = (0..250_000u32).map(|i| (i % 251) as u8).collect();
        let mut encryptor = Encryptor::new(Cursor::new(content.clone()), 70_000);
        let mut decryptor = Decryptor::new(encryptor.secret().clone());

        let mut plaintext = Vec::new();
        while let Some(part) = encryptor.next_part().unwrap() {
            plaintext.extend(decryptor.push(&part).unwrap());
        }
        let (tail, checksums) = decryptor.finish().unwrap();
        plaintext.extend(tail);

        assert_eq!(plaintext, content);
        assert_eq!(&checksums, encryptor.checksums());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let mut encryptor = Encryptor::new(Cursor::new(vec![9u8; 1000]), 4096);
        let part = encryptor.next_part().unwrap().unwrap();

        let mut decryptor = Decryptor::new(FileSecret::generate());
        decryptor.push(&part).unwrap();
        assert!(decryptor.finish().is_err());
    }
}
