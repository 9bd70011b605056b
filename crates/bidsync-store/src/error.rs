//! Error types for dataset store operations.
//!
//! [`StoreError`] is returned by every [`VersionedDatasetStore`](crate::VersionedDatasetStore)
//! method. Variants separate contract violations (bad alias, missing dataset)
//! from backend failures so callers can decide whether a retry from a fresh
//! clone makes sense.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An alias string failed validation.
    #[error("invalid RIA alias `{value}`: {reason}")]
    InvalidAlias {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// The alias has no dataset in the store.
    #[error("dataset `{alias}` not found in store")]
    NotFound {
        /// The alias that was looked up.
        alias: String,
    },

    /// A dataset already exists where one was about to be created.
    #[error("dataset `{alias}` already exists in store")]
    AlreadyExists {
        /// The alias that was already taken.
        alias: String,
    },

    /// The destination of a clone is already occupied.
    #[error("working copy destination {} already exists", path.display())]
    DestinationExists {
        /// The occupied path.
        path: PathBuf,
    },

    /// An external command (`datalad ...`) failed.
    #[error("`{command}` failed{}: {stderr}", exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    Command {
        /// The command line that was run.
        command: String,
        /// Captured stderr (trimmed).
        stderr: String,
        /// The process exit code, if the process exited normally.
        exit_code: Option<i32>,
    },

    /// Walking a directory tree failed.
    #[error("walking {}: {source}", path.display())]
    Walk {
        /// The root being walked.
        path: PathBuf,
        /// Underlying walkdir error.
        #[source]
        source: walkdir::Error,
    },

    /// An I/O error occurred (file system, process spawn, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
