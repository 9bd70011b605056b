//! Dataset-level conventions and housekeeping.
//!
//! A dataset root mixes payload (subject trees, sidecar files,
//! `participants.tsv`) with entries owned by the versioning backend. The
//! latter are never merged, copied or deleted by anything in this crate.

use std::fs;
use std::path::Path;

use tracing::instrument;

use crate::error::MergeError;

/// Entries managed by the versioning backend.
pub const RESERVED_DATASET_ENTRIES: [&str; 4] =
    [".git", ".gitattributes", ".datalad", ".dataladattributes"];

/// Top-level directory holding the dataset owner's tooling.
pub const CODE_DIR: &str = "code";

/// The BIDS participant registry.
pub const PARTICIPANTS_TSV: &str = "participants.tsv";

/// Whether `name` is one of the backend-managed top-level entries.
#[must_use]
pub fn is_dataset_management_entry(name: &str) -> bool {
    RESERVED_DATASET_ENTRIES.contains(&name)
}

/// Delete every top-level entry of a dataset except the backend-managed ones.
///
/// Files and symlinks are unlinked (a symlink to a directory is unlinked, not
/// followed); directories are removed recursively. Returns the removed names
/// in directory order.
///
/// # Errors
/// Returns [`MergeError::Io`] on the first entry that cannot be removed;
/// entries removed before it stay removed.
#[instrument(skip_all, fields(dataset = %path_dataset.display()))]
pub fn wipe_contents(path_dataset: &Path) -> Result<Vec<String>, MergeError> {
    let mut removed = Vec::new();
    let entries = fs::read_dir(path_dataset).map_err(MergeError::io("read", path_dataset))?;
    for entry in entries {
        let entry = entry.map_err(MergeError::io("read", path_dataset))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dataset_management_entry(&name) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type().map_err(MergeError::io("stat", &path))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(MergeError::io("remove", &path))?;
        } else {
            fs::remove_file(&path).map_err(MergeError::io("remove", &path))?;
        }
        tracing::debug!(entry = %name, "removed");
        removed.push(name);
    }
    tracing::info!(count = removed.len(), "dataset contents wiped");
    Ok(removed)
}
