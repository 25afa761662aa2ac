//! Crypt4GH-style segment encryption for the upload benchmark.
//!
//! Content is encrypted with ChaCha20-Poly1305 (IETF) in segments of
//! [`SEGMENT_SIZE`] bytes using one random [`FileSecret`] per file. The
//! [`Encryptor`] turns a reader into encrypted upload parts and the
//! [`Decryptor`] reverses that on downloaded parts; both keep [`Checksums`]
//! so the two sides can be compared.
//!
//! [`Checksums`]: crate::Checksums
//!
//! # Example
//!
//! ```rust,ignore
//! use testbed_core::crypto::{Decryptor, Encryptor};
//!
//! let mut encryptor = Encryptor::new(file, part_size);
//! let mut decryptor = Decryptor::new(encryptor.secret().clone());
//!
//! while let Some(part) = encryptor.next_part()? {
//!     decryptor.push(&part)?;
//! }
//! let (_, checksums) = decryptor.finish()?;
//! assert_eq!(&checksums, encryptor.checksums());
//! ```

mod decryptor;
mod encryptor;
mod error;
mod segment;

pub use decryptor::Decryptor;
pub use encryptor::Encryptor;
pub use error::{CryptoError, CryptoResult};
pub use segment::{
    CIPHER_SEGMENT_SIZE, FileSecret, NONCE_SIZE, SEGMENT_OVERHEAD, SEGMENT_SIZE, TAG_SIZE,
    decrypt_segment, encrypt_segment, encrypted_size,
};
