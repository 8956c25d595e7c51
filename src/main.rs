//! s3up: uploads a configured set of local files to S3 buckets, switching
//! to multipart transfers for large files.
//!
//! No flags; reads `config.ini` next to the executable and runs once.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod error;
mod progress;
mod store;
mod upload;

use store::S3Store;
use upload::Uploader;

fn config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("config.ini")))
        .unwrap_or_else(|| PathBuf::from("config.ini"))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = config_path();
    let config = match config::load(&path) {
        Ok(config) => config,
        Err(err) => {
            // Without a valid config no uploads are attempted.
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(S3Store::connect(&config.credentials));
    let uploader = Uploader::new(store, config.transfer.clone());
    let summary = uploader.upload_all(&config.mapping).await;

    log::info!(
        "Run complete: {} uploaded, {} failed",
        summary.uploaded,
        summary.failed
    );

    // Per-file failures are reported through the log, not the exit code.
    ExitCode::SUCCESS
}
