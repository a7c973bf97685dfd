// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only fatal conditions are represented here. A renderer that crashes or
//! exits non-zero is retried by the supervisor and, once the retry policy is
//! exhausted, reported as [`JobOutcome::Failed`](crate::job::JobOutcome)
//! rather than as an error.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported output extension '{0}': expected one of png, jpg, jpeg or bmp")]
    UnsupportedExtension(String),

    #[error("Renderer binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Required asset does not exist: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Whether this error is a configuration problem that retrying can never
    /// fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RenderError::ConfigError(_)
                | RenderError::UnsupportedExtension(_)
                | RenderError::BinaryNotFound(_)
                | RenderError::MissingAsset(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RenderError>;
