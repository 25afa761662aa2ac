//! CLI configuration management.
//!
//! ```text
//! Cli
//! └── command: Command
//!     ├── validate-storage-permissions  --config-path
//!     ├── validate-download             --config-path [--object-key]
//!     └── benchmark-upload              --config-path --input-path [-v] [-d]
//! ```
//!
//! The S3 settings of every check live in its YAML configuration file; the
//! command line only points at that file and the check's inputs.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use crate::TRACING_TARGET_STARTUP;

/// Command-line interface of the DataHub test bed.
#[derive(Debug, Clone, Parser)]
#[command(name = "datahub-test-bed")]
#[command(about = "Checks and benchmarks for the object storage of a GHGA DataHub")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// The checks the test bed can run.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check bucket permissions of the master, ifrs and dcs accounts.
    ValidateStoragePermissions(ConfigArgs),

    /// Download an object through a presigned URL and compare checksums.
    ValidateDownload(DownloadArgs),

    /// Encrypt, upload, download and decrypt a file and report timings.
    BenchmarkUpload(BenchmarkArgs),
}

/// Path of a YAML configuration file.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Path to the YAML configuration file.
    #[arg(long, env = "TESTBED_CONFIG_PATH")]
    pub config_path: PathBuf,
}

/// Arguments of `validate-download`.
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Download an existing object instead of uploading a generated file.
    #[arg(long)]
    pub object_key: Option<String>,
}

/// Arguments of `benchmark-upload`.
#[derive(Debug, Clone, Args)]
pub struct BenchmarkArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// File to encrypt and upload.
    #[arg(long)]
    pub input_path: PathBuf,

    /// Log progress of every part at INFO.
    #[arg(short, long)]
    pub verbose: bool,

    /// Lower the default log level to DEBUG.
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Returns whether debug logging was requested.
    pub fn debug(&self) -> bool {
        matches!(&self.command, Command::BenchmarkUpload(args) if args.debug)
    }

    /// Logs build information at debug level.
    pub fn log_build_info(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            command = self.command.name(),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            "Build information"
        );
    }
}

impl Command {
    /// Returns the subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidateStoragePermissions(_) => "validate-storage-permissions",
            Self::ValidateDownload(_) => "validate-download",
            Self::BenchmarkUpload(_) => "benchmark-upload",
        }
    }
}
