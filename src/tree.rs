//! Serializable directory listings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// A directory's contents, recursively.
///
/// Symlinks are listed by what they point to: a link to a directory appears
/// under `dirs` and is descended into, anything else (including a dangling
/// link) appears under `files`. A linked directory that resolves to one of
/// its own ancestors makes the scan fail.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTree {
    /// Non-directory entry names, sorted.
    pub files: Vec<String>,
    /// Subdirectories by name.
    pub dirs: BTreeMap<String, DirTree>,
}

impl DirTree {
    /// Build the listing rooted at `path`.
    ///
    /// # Errors
    /// [`MergeError::Io`] if `path` or any directory below it cannot be
    /// read, or a symlink below it loops back to an enclosing directory.
    pub fn scan(path: &Path) -> Result<Self, MergeError> {
        Self::scan_within(path, &mut Vec::new())
    }

    fn scan_within(path: &Path, ancestors: &mut Vec<PathBuf>) -> Result<Self, MergeError> {
        let canonical = fs::canonicalize(path).map_err(MergeError::io("resolve", path))?;
        if ancestors.contains(&canonical) {
            return Err(MergeError::symlink_loop(path));
        }
        ancestors.push(canonical);
        let tree = Self::scan_entries(path, ancestors);
        ancestors.pop();
        tree
    }

    fn scan_entries(path: &Path, ancestors: &mut Vec<PathBuf>) -> Result<Self, MergeError> {
        let mut tree = Self::default();
        for entry in fs::read_dir(path).map_err(MergeError::io("read", path))? {
            let entry = entry.map_err(MergeError::io("read", path))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = entry.path();
            if child.is_dir() {
                tree.dirs.insert(name, Self::scan_within(&child, ancestors)?);
            } else {
                tree.files.push(name);
            }
        }
        tree.files.sort();
        Ok(tree)
    }

    /// Number of files in the whole tree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len() + self.dirs.values().map(Self::file_count).sum::<usize>()
    }

    /// Whether the tree holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}
