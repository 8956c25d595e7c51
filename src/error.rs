//! Error types for config loading and uploads

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("config error: {0}")]
    Config(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("credentials rejected: {0}")]
    Credentials(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
