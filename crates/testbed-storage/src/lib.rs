#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging
pub const TRACING_TARGET_CLIENT: &str = "testbed_storage::client";
pub const TRACING_TARGET_OPERATIONS: &str = "testbed_storage::operations";
pub const TRACING_TARGET_TRANSFER: &str = "testbed_storage::transfer";

mod error;

pub mod client;
pub mod operations;
pub mod transfer;

pub use crate::client::StorageClient;
pub use crate::error::{Result, StorageError};
pub use crate::operations::{ObjectStorage, UploadedPart};
pub use crate::transfer::{HttpTransfer, PresignedTransfer};
