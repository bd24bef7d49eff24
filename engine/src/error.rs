//! Error types for the ingest engine.
//!
//! `EngineError` covers the conditions that stop a single file (or a whole
//! cycle) from being processed: unreadable inputs, failed writes, failed
//! moves. Content problems found while validating a file are NOT engine
//! errors; they are carried as [`ValidationErrors`](crate::validation::ValidationErrors)
//! inside a failure outcome and end up in the file's error report.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a file or a cycle from completing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to open or read a file
    #[error("Failed to read file: {}", path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to create or write a file
    #[error("Failed to write file: {}", path.display())]
    WriteError { path: PathBuf, source: io::Error },

    /// Failed to relocate a file between folders
    #[error("Failed to move {} to {}", from.display(), to.display())]
    MoveError {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Failed to list a directory
    #[error("Failed to enumerate directory: {}", path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A worker or sink thread could not be started
    #[error("Failed to spawn thread '{name}'")]
    WorkerSpawn { name: String, source: io::Error },

    /// An outcome was dispatched for a file nobody had claimed
    #[error("Outcome for '{file_id}' dispatched without a claim")]
    NotClaimed { file_id: String },

    /// A sink thread has stopped and no longer accepts outcomes
    #[error("The {sink} sink is no longer running")]
    SinkClosed { sink: &'static str },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::MoveError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::WorkerSpawn { source, .. } => source.raw_os_error(),
            Self::InvalidConfig { .. } | Self::NotClaimed { .. } | Self::SinkClosed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = EngineError::ReadError {
            path: PathBuf::from("/data/Input/A.dat"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "Failed to read file: /data/Input/A.dat");
    }

    #[test]
    fn test_raw_os_error() {
        let err = EngineError::WriteError {
            path: PathBuf::from("x"),
            source: io::Error::from_raw_os_error(13),
        };
        assert_eq!(err.raw_os_error(), Some(13));

        let err = EngineError::InvalidConfig {
            reason: "workers must be at least 1".to_string(),
        };
        assert_eq!(err.raw_os_error(), None);
    }
}
