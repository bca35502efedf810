//! Error taxonomy for assembly runs.
//!
//! Every variant is fatal to the current run. Nothing in this crate retries
//! or swallows an `AssemblyError`; callers report the message verbatim.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Artifact not found, repository unreachable, transport or checksum failure.
    #[error("unable to resolve {coordinate}: {reason}")]
    Resolution { coordinate: String, reason: String },

    /// Extraction, copy, delete or directory creation failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid plan, ambiguous build output, missing exclusion target.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AssemblyError>;

impl AssemblyError {
    pub fn resolution(coordinate: impl ToString, reason: impl Into<String>) -> Self {
        AssemblyError::Resolution {
            coordinate: coordinate.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AssemblyError::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, AssemblyError::Configuration(_))
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, AssemblyError::Resolution { .. })
    }
}

/// Attach a path-bearing description to an `io::Result`, mirroring
/// `anyhow::Context` for the typed error.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| AssemblyError::Io {
            context: f().into(),
            source,
        })
    }
}

pub(crate) fn io_error(context: impl Into<String>, source: std::io::Error) -> AssemblyError {
    AssemblyError::Io {
        context: context.into(),
        source,
    }
}

pub(crate) fn zip_error(archive: &Path, err: zip::result::ZipError) -> AssemblyError {
    let source = match err {
        zip::result::ZipError::Io(inner) => inner,
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
    };
    io_error(format!("reading archive '{}'", archive.display()), source)
}
