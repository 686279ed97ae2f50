//! Snapshot pipeline error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while extracting, ranking or writing a balance snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File could not be opened, read, written or renamed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// State dump is not well-formed JSON at the point reached
    #[error("Failed to parse state dump {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The nested key path to the user states array is absent
    #[error("State dump {path} has no value at '{key_path}'")]
    MissingPath { path: PathBuf, key_path: String },

    /// A balance value has no numeric interpretation
    #[error("Balance '{value}' for address {address} is not a valid number")]
    InvalidBalance { address: String, value: String },

    /// More than one entry for the selected token under the `error` policy
    #[error("Address {address} holds more than one entry for token {token_id}")]
    DuplicateEntry { address: String, token_id: u64 },

    /// A user state consumer aborted the stream
    #[error("User state callback failed: {0}")]
    Callback(anyhow::Error),

    /// Merkle distribution requested over an empty balance list
    #[error("Cannot build a Merkle distribution from zero balances")]
    EmptyDistribution,
}

impl SnapshotError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SnapshotError::Io {
            path: path.into(),
            source,
        }
    }

    /// Split a serde_json failure into the I/O and syntax halves of the taxonomy
    pub(crate) fn from_json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        let path = path.into();
        if source.is_io() {
            let kind = source.io_error_kind().unwrap_or(std::io::ErrorKind::Other);
            return SnapshotError::Io {
                path,
                source: std::io::Error::new(kind, source),
            };
        }
        SnapshotError::Parse { path, source }
    }
}
