#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use testbed_core::config::ConfigFile;
use testbed_core::{DownloadConfig, StorageConfig, UploadConfig, load_config};
use testbed_validations::{run_benchmark, run_download_validation, run_storage_validation};

use crate::config::{BenchmarkArgs, Cli, Command, ConfigArgs, DownloadArgs};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "testbed_cli::startup";
pub const TRACING_TARGET_CONFIG: &str = "testbed_cli::config";
pub const TRACING_TARGET_SHUTDOWN: &str = "testbed_cli::shutdown";

#[tokio::main]
async fn main() -> ExitCode {
    let error = match run().await {
        Ok(code) => return code,
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            "{error:#}"
        );
    } else {
        eprintln!("{error:#}");
    }

    ExitCode::FAILURE
}

/// Main application entry point.
async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.debug())?;
    cli.log_build_info();

    match cli.command {
        Command::ValidateStoragePermissions(args) => validate_storage_permissions(args).await,
        Command::ValidateDownload(args) => validate_download(args).await,
        Command::BenchmarkUpload(args) => benchmark_upload(args).await,
    }
}

async fn validate_storage_permissions(args: ConfigArgs) -> anyhow::Result<ExitCode> {
    let config: StorageConfig = load(&args.config_path)?;
    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        endpoint = %config.s3_url_endpoint,
        master = %config.master_account.name,
        ifrs = %config.ifrs_account.name,
        dcs = %config.dcs_account.name,
        part_size = config.test_file_part_size,
        part_count = config.test_file_part_count,
        "Storage permission validation configured"
    );

    let report = run_storage_validation(&config)
        .await
        .context("Storage permission validation failed")?;

    Ok(exit_code(!report.has_unexpected()))
}

async fn validate_download(args: DownloadArgs) -> anyhow::Result<ExitCode> {
    let config: DownloadConfig = load(&args.config.config_path)?;
    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        endpoint = %config.s3_url_endpoint,
        bucket = %config.bucket,
        upload_account = %config.account_for_upload.name,
        download_account = %config.account_for_download.name,
        object_key = ?args.object_key,
        "Download validation configured"
    );

    let report = run_download_validation(&config, args.object_key)
        .await
        .context("Download validation failed")?;

    Ok(exit_code(report.is_match()))
}

async fn benchmark_upload(args: BenchmarkArgs) -> anyhow::Result<ExitCode> {
    let config: UploadConfig = load(&args.config.config_path)?;
    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        endpoint = %config.s3_endpoint_url,
        bucket = %config.bucket_id,
        part_size_mib = config.part_size,
        input = %args.input_path.display(),
        "Upload benchmark configured"
    );

    run_benchmark(&args.input_path, &config, args.verbose)
        .await
        .context("Upload benchmark failed")?;

    Ok(ExitCode::SUCCESS)
}

/// Loads a configuration file, naming its kind in the error.
fn load<T: ConfigFile>(path: &Path) -> anyhow::Result<T> {
    load_config(path).with_context(|| format!("Error loading {} config", T::KIND))
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn config_error_names_the_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3_url_endpoint: [not, a, url]").unwrap();

        let error = load::<StorageConfig>(file.path()).unwrap_err();
        let message = format!("{error:#}");
        assert!(message.starts_with("Error loading storage config: "));
    }

    #[test]
    fn failed_check_exits_with_failure() {
        assert_eq!(exit_code(true), ExitCode::SUCCESS);
        assert_eq!(exit_code(false), ExitCode::FAILURE);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let error = load::<UploadConfig>(Path::new("/nonexistent/upload.yaml")).unwrap_err();
        assert!(format!("{error:#}").starts_with("Error loading upload config: "));
    }
}
