//! Merge error types.
//!
//! Defines [`MergeError`], returned by every operation that touches a dataset
//! tree. There is no rollback: when a merge fails part-way, the destination
//! may already hold some incoming entries and the incoming tree may already
//! have lost some. Recovery is to discard the working copy without
//! publishing it and start again from a fresh clone.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while merging or maintaining dataset trees.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A path could not be expressed relative to its declared root.
    ///
    /// This is a caller contract violation and is never retried.
    #[error("{} is not inside {}", path.display(), root.display())]
    PathResolution {
        /// The path that was supposed to be a descendant.
        path: PathBuf,
        /// The declared ancestor.
        root: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("{} {}: {source}", op, path.display())]
    Io {
        /// What was being attempted (`"copy"`, `"read"`, ...).
        op: &'static str,
        /// The path the operation was applied to.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Top-level incoming files collided with existing entries and the merge
    /// was configured to fail on conflicts.
    ///
    /// Raised only after every other entry and `participants.tsv` have been
    /// merged, so the destination reflects everything that did not collide.
    #[error(
        "incoming top-level file(s) already exist in the destination and were left in place: {}",
        names.join(", ")
    )]
    TopLevelConflict {
        /// The colliding entry names.
        names: Vec<String>,
    },
}

impl MergeError {
    /// Build a mapper from [`io::Error`] for use with `map_err`.
    pub(crate) fn io<'a>(
        op: &'static str,
        path: &'a Path,
    ) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// A symlinked directory at `path` resolves to one of its own ancestors.
    pub(crate) fn symlink_loop(path: &Path) -> Self {
        Self::Io {
            op: "follow",
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "symlink points back to an enclosing directory",
            ),
        }
    }

    /// Whether the error came from the filesystem (as opposed to a contract
    /// violation or a reported conflict).
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
