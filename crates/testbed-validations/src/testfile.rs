//! Generated test files uploaded by the validators.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use tempfile::Builder;

const WRITE_CHUNK_SIZE: usize = 1024 * 1024;

/// A generated file whose name doubles as its object key.
///
/// The file stays on disk after the run.
#[derive(Debug, Clone)]
pub struct TestFile {
    path: PathBuf,
    key: String,
    size: u64,
}

impl TestFile {
    /// Creates a file of `size` zero bytes named `testfile_upload_<account>_*`.
    pub fn zero_filled(dir: &Path, account: &str, size: u64) -> io::Result<Self> {
        Self::generate(dir, account, size, |buffer| buffer.fill(0))
    }

    /// Creates a file of `size` random bytes named `testfile_upload_<account>_*`.
    pub fn random_filled(dir: &Path, account: &str, size: u64) -> io::Result<Self> {
        let mut rng = rand::rng();
        Self::generate(dir, account, size, |buffer| rng.fill_bytes(buffer))
    }

    fn generate(
        dir: &Path,
        account: &str,
        size: u64,
        mut fill: impl FnMut(&mut [u8]),
    ) -> io::Result<Self> {
        let mut file = Builder::new()
            .prefix(&format!("testfile_upload_{account}_"))
            .tempfile_in(dir)?;

        let key = file
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| io::Error::other("temporary file name is not valid UTF-8"))?;

        let mut buffer = vec![0u8; WRITE_CHUNK_SIZE];
        let mut remaining = size;
        while remaining > 0 {
            let len = remaining.min(WRITE_CHUNK_SIZE as u64) as usize;
            fill(&mut buffer[..len]);
            file.write_all(&buffer[..len])?;
            remaining -= len as u64;
        }
        file.flush()?;
        let (_, path) = file.keep()?;

        tracing::debug!(
            target: crate::TRACING_TARGET_STORAGE,
            path = %path.display(),
            size,
            "Test file generated"
        );

        Ok(Self { path, key, size })
    }

    /// Returns the local path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the object key the file is uploaded under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the file size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_filled_file_has_size_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let file = TestFile::zero_filled(dir.path(), "ifrs", 3 * 1024 * 1024 + 5).unwrap();

        let content = std::fs::read(file.path()).unwrap();
        assert_eq!(content.len() as u64, file.size());
        assert!(content.iter().all(|&b| b == 0));
        assert!(file.key().starts_with("testfile_upload_ifrs_"));
    }

    #[test]
    fn file_is_kept_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = TestFile::random_filled(dir.path(), "master", 4096).unwrap();
        let path = file.path().to_path_buf();

        drop(file);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }
}
