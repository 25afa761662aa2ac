#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging
pub const TRACING_TARGET_PERMISSIONS: &str = "testbed_validations::permissions";
pub const TRACING_TARGET_STORAGE: &str = "testbed_validations::storage";
pub const TRACING_TARGET_DOWNLOAD: &str = "testbed_validations::download";
pub const TRACING_TARGET_BENCHMARK: &str = "testbed_validations::benchmark";

mod error;

pub mod benchmark;
pub mod download;
pub mod permissions;
pub mod storage;
pub mod testfile;

#[cfg(test)]
mod testing;

pub use crate::benchmark::{Benchmark, BenchmarkSummary, run_benchmark};
pub use crate::download::{DownloadReport, DownloadValidator, run_download_validation};
pub use crate::error::{Error, Result};
pub use crate::permissions::Report;
pub use crate::storage::{BucketNames, StorageSettings, StorageValidator, run_storage_validation};
