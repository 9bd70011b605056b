//! Recursive tree union used by the dataset merge.
//!
//! Copies an incoming directory into the destination dataset, creating
//! directories as needed and descending into ones that already exist. Every
//! directory's entries go through [`filter_existing`] first; whatever it
//! excludes is left alone at the destination and recorded as skipped.
//!
//! Symlinks in the incoming tree are followed: the destination receives the
//! target's content (or, for a linked directory, its merged contents).
//! Dangling symlinks have no content to copy and are recreated as symlinks.
//! A linked directory that resolves to one of its own ancestors is an error.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use super::existing::filter_existing;
use crate::error::MergeError;

/// Running totals for one merge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CopyStats {
    /// Files (and recreated dangling symlinks) written to the destination.
    pub copied: usize,
    /// Incoming-relative paths excluded by the existence check.
    pub skipped: Vec<PathBuf>,
}

/// Merge `src_dir` (inside `root_incoming`) into the same relative location
/// under `root_existing`.
pub(crate) fn merge_tree(
    root_incoming: &Path,
    root_existing: &Path,
    src_dir: &Path,
    stats: &mut CopyStats,
) -> Result<(), MergeError> {
    merge_dir(root_incoming, root_existing, src_dir, stats, &mut Vec::new())
}

/// `ancestors` holds the canonical paths of the directories being walked,
/// outermost first.
fn merge_dir(
    root_incoming: &Path,
    root_existing: &Path,
    src_dir: &Path,
    stats: &mut CopyStats,
    ancestors: &mut Vec<PathBuf>,
) -> Result<(), MergeError> {
    let canonical = fs::canonicalize(src_dir).map_err(MergeError::io("resolve", src_dir))?;
    if ancestors.contains(&canonical) {
        return Err(MergeError::symlink_loop(src_dir));
    }
    ancestors.push(canonical);
    let result = merge_entries(root_incoming, root_existing, src_dir, stats, ancestors);
    ancestors.pop();
    result
}

fn merge_entries(
    root_incoming: &Path,
    root_existing: &Path,
    src_dir: &Path,
    stats: &mut CopyStats,
    ancestors: &mut Vec<PathBuf>,
) -> Result<(), MergeError> {
    let relative = src_dir
        .strip_prefix(root_incoming)
        .map_err(|_| MergeError::PathResolution {
            path: src_dir.to_path_buf(),
            root: root_incoming.to_path_buf(),
        })?;
    let dst_dir = root_existing.join(relative);
    fs::create_dir_all(&dst_dir).map_err(MergeError::io("create", &dst_dir))?;

    let mut names: Vec<OsString> = Vec::new();
    for entry in fs::read_dir(src_dir).map_err(MergeError::io("read", src_dir))? {
        let entry = entry.map_err(MergeError::io("read", src_dir))?;
        names.push(entry.file_name());
    }
    names.sort();

    let excluded: HashSet<PathBuf> = filter_existing(root_incoming, root_existing, src_dir, &names)?
        .into_iter()
        .collect();

    for name in &names {
        let src = src_dir.join(name);
        let dst = dst_dir.join(name);
        if excluded.contains(Path::new(name)) {
            tracing::debug!(path = %relative.join(name).display(), "already present, not copied");
            stats.skipped.push(relative.join(name));
            continue;
        }

        let link_meta = fs::symlink_metadata(&src).map_err(MergeError::io("stat", &src))?;
        if link_meta.file_type().is_symlink() {
            match fs::metadata(&src) {
                Ok(target) if target.is_dir() => {
                    merge_dir(root_incoming, root_existing, &src, stats, ancestors)?;
                }
                Ok(_) => {
                    copy_file(&src, &dst)?;
                    stats.copied += 1;
                }
                Err(_) => {
                    copy_dangling_symlink(&src, &dst)?;
                    stats.copied += 1;
                }
            }
        } else if link_meta.is_dir() {
            merge_dir(root_incoming, root_existing, &src, stats, ancestors)?;
        } else {
            copy_file(&src, &dst)?;
            stats.copied += 1;
        }
    }
    Ok(())
}

/// Copy file content and permissions, then carry over access and
/// modification times.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> Result<(), MergeError> {
    fs::copy(src, dst).map_err(MergeError::io("copy", src))?;
    let meta = fs::metadata(src).map_err(MergeError::io("stat", src))?;
    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .map_err(MergeError::io("set times on", dst))?;
    Ok(())
}

#[cfg(unix)]
fn copy_dangling_symlink(src: &Path, dst: &Path) -> Result<(), MergeError> {
    let target = fs::read_link(src).map_err(MergeError::io("read link", src))?;
    std::os::unix::fs::symlink(&target, dst).map_err(MergeError::io("link", dst))
}

#[cfg(not(unix))]
fn copy_dangling_symlink(src: &Path, _dst: &Path) -> Result<(), MergeError> {
    Err(MergeError::Io {
        op: "copy",
        path: src.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "dangling symlink cannot be copied on this platform",
        ),
    })
}
