//! Application-wide error types.
//!
//! Library modules return [`Result`] over the [`Error`] enum built with
//! `thiserror`, while the CLI and `main` use `anyhow` for convenient error
//! propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum, one variant per failure class a file can
//!   hit on its way through the pipeline
//! - [`TranscodeError`]: Failures of the external encoder and the tag repair
//!   that follows it
//!
//! Only configuration errors are fatal to a run. Everything else is reported
//! per file and the walk continues.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The tag reader does not recognise this container
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Tag data could not be read or written
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// A path component that must be a directory exists as something else
    #[error("Destination path exists and is not a directory: {path}")]
    DestinationConflict { path: PathBuf },

    /// Encoder or post-encode tag repair failed
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Configuration or pre-flight validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an unsupported format error.
    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a destination conflict error.
    pub fn destination_conflict(path: impl Into<PathBuf>) -> Self {
        Self::DestinationConflict { path: path.into() }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Errors raised while producing an MP3 with the external encoder.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("encoder not found: {0}")]
    EncoderNotFound(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder exited with {status}: {stderr}")]
    EncoderFailed { status: ExitStatus, stderr: String },

    #[error("destination must end in .mp3: {0}")]
    NotMp3(PathBuf),

    #[error("tag repair failed for {path}: {message}")]
    TagRepair { path: PathBuf, message: String },
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}
