#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging
pub const TRACING_TARGET_CONFIG: &str = "testbed_core::config";
pub const TRACING_TARGET_CRYPTO: &str = "testbed_core::crypto";
pub const TRACING_TARGET_PARTS: &str = "testbed_core::parts";

mod error;

pub mod checksum;
pub mod config;
pub mod crypto;
pub mod parts;

pub use crate::checksum::{Checksums, sha256_file};
pub use crate::config::{AccountConfig, DownloadConfig, StorageConfig, UploadConfig, load_config};
pub use crate::error::{Error, Result};

/// Number of bytes in one mebibyte.
pub const MIB: u64 = 1024 * 1024;
