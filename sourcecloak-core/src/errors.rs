//! Error types for SourceCloak

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceCloakError>;

#[derive(Error, Debug)]
pub enum SourceCloakError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to replace {}: {source}", .path.display())]
    Replace {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("license error: {0}")]
    License(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}
