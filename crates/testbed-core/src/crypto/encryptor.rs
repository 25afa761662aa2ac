//! On-the-fly encryption of a file into upload parts.

use std::io::Read;

use super::segment::{FileSecret, SEGMENT_SIZE, encrypt_segment};
use crate::Result;
use crate::checksum::Checksums;

/// Splits plain content into encrypted parts of a fixed size.
///
/// Reads `part_size` bytes at a time, encrypts every complete segment and
/// carries the incomplete tail over to the next read. Emitted parts are
/// exactly `part_size` bytes long except for the last one.
pub struct Encryptor<R> {
    reader: R,
    part_size: usize,
    secret: FileSecret,
    checksums: Checksums,
    unprocessed: Vec<u8>,
    buffer: Vec<u8>,
    encrypted_size: u64,
    exhausted: bool,
}

impl<R: Read> Encryptor<R> {
    /// Creates an encryptor with a freshly generated secret.
    pub fn new(reader: R, part_size: usize) -> Self {
        Self::with_secret(reader, part_size, FileSecret::generate())
    }

    /// Creates an encryptor using the given secret.
    pub fn with_secret(reader: R, part_size: usize, secret: FileSecret) -> Self {
        Self {
            reader,
            part_size,
            secret,
            checksums: Checksums::new(),
            unprocessed: Vec::new(),
            buffer: Vec::new(),
            encrypted_size: 0,
            exhausted: false,
        }
    }

    /// Returns the next encrypted part, or `None` once all content was emitted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input or encrypting a segment fails.
    pub fn next_part(&mut self) -> Result<Option<Vec<u8>>> {
        while self.buffer.len() < self.part_size && !self.exhausted {
            let chunk = self.read_chunk()?;
            if chunk.is_empty() {
                self.exhausted = true;
                if !self.unprocessed.is_empty() {
                    let tail = std::mem::take(&mut self.unprocessed);
                    self.buffer.extend(encrypt_segment(&self.secret, &tail)?);
                }
                break;
            }

            self.checksums.update_unencrypted(&chunk);
            self.unprocessed.extend_from_slice(&chunk);
            self.encrypt_complete_segments()?;
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let len = self.part_size.min(self.buffer.len());
        let part: Vec<u8> = self.buffer.drain(..len).collect();
        self.checksums.update_encrypted(&part);
        self.encrypted_size += part.len() as u64;

        Ok(Some(part))
    }

    /// Returns the secret used for every segment.
    pub fn secret(&self) -> &FileSecret {
        &self.secret
    }

    /// Returns the checksums of the content processed so far.
    pub fn checksums(&self) -> &Checksums {
        &self.checksums
    }

    /// Returns the number of encrypted bytes emitted so far.
    pub fn encrypted_size(&self) -> u64 {
        self.encrypted_size
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        let mut chunk = Vec::with_capacity(self.part_size);
        (&mut self.reader)
            .take(self.part_size as u64)
            .read_to_end(&mut chunk)?;
        Ok(chunk)
    }

    fn encrypt_complete_segments(&mut self) -> Result<()> {
        let complete = self.unprocessed.len() / SEGMENT_SIZE * SEGMENT_SIZE;
        for segment in self.unprocessed[..complete].chunks(SEGMENT_SIZE) {
            self.buffer.extend(encrypt_segment(&self.secret, segment)?);
        }
        self.unprocessed.drain(..complete);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::crypto::{CIPHER_SEGMENT_SIZE, encrypted_size};

    fn collect_parts<R: Read>(encryptor: &mut Encryptor<R>) -> Vec<Vec<u8>> {
        let mut parts = Vec::new();
        while let Some(part) = encryptor.next_part().unwrap() {
            parts.push(part);
        }
        parts
    }

    #[test]
    fn parts_have_fixed_size_except_last() {
        let content = vec![3u8; 300_000];
        let part_size = 100_000;
        let mut encryptor = Encryptor::new(Cursor::new(content.clone()), part_size);

        let parts = collect_parts(&mut encryptor);
        let total: usize = parts.iter().map(Vec::len).sum();

        assert_eq!(total as u64, encrypted_size(content.len() as u64));
        assert_eq!(encryptor.encrypted_size(), total as u64);
        assert!(parts[..parts.len() - 1].iter().all(|p| p.len() == part_size));
        assert!(parts.last().unwrap().len() <= part_size);
        assert_eq!(parts.len(), total.div_ceil(part_size));
        assert_eq!(encryptor.checksums().encrypted_sha256().len(), parts.len());
    }

    #[test]
    fn exact_segment_multiple_has_no_dangling_segment() {
        let content = vec![1u8; SEGMENT_SIZE * 2];
        let mut encryptor = Encryptor::new(Cursor::new(content), SEGMENT_SIZE);

        let parts = collect_parts(&mut encryptor);
        let total: usize = parts.iter().map(Vec::len).sum();
        assert_eq!(total, CIPHER_SEGMENT_SIZE * 2);
    }

    #[test]
    fn empty_input_yields_no_parts() {
        let mut encryptor = Encryptor::new(Cursor::new(Vec::new()), 1024);
        assert!(encryptor.next_part().unwrap().is_none());
        assert_eq!(encryptor.encrypted_size(), 0);
    }
}
