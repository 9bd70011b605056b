//! Directory-backed store.
//!
//! Keeps each dataset as a plain directory under a root. There is no content
//! addressing and no annex: cloning copies the tree, finalizing replaces the
//! stored tree with the working copy and appends the message to a history
//! file. Useful for tests and for running the merge pipeline without datalad.
//!
//! # Directory layout
//!
//! ```text
//! root/
//! └── <alias>/
//!     ├── .datalad/
//!     │   └── history        ← one finalize message per line
//!     └── ...                ← dataset content
//! ```
//!
//! Working copies additionally carry `.datalad/origin` with the alias they
//! were cloned from; it is stripped again on finalize.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::instrument;
use walkdir::WalkDir;

use crate::alias::RiaAlias;
use crate::error::StoreError;
use crate::store::VersionedDatasetStore;

const METADATA_DIR: &str = ".datalad";
const ORIGIN_FILE: &str = "origin";
const HISTORY_FILE: &str = "history";

/// A [`VersionedDatasetStore`] keeping datasets as directories under `root`.
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the stored copy of `alias` lives.
    #[must_use]
    pub fn dataset_path(&self, alias: &RiaAlias) -> PathBuf {
        self.root.join(alias.as_str())
    }

    /// Finalize messages recorded for `alias`, oldest first.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the alias does not exist, or an I/O error
    /// reading the history file.
    pub fn history(&self, alias: &RiaAlias) -> Result<Vec<String>, StoreError> {
        if !self.exists(alias)? {
            return Err(StoreError::NotFound {
                alias: alias.as_str().to_owned(),
            });
        }
        let path = self
            .dataset_path(alias)
            .join(METADATA_DIR)
            .join(HISTORY_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(raw.lines().map(str::to_owned).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    fn read_origin(working_copy: &Path) -> Result<RiaAlias, StoreError> {
        let path = working_copy.join(METADATA_DIR).join(ORIGIN_FILE);
        let raw = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    alias: format!("<origin of {}>", working_copy.display()),
                }
            } else {
                e.into()
            }
        })?;
        RiaAlias::new(raw.trim())
    }

    fn append_history(dataset: &Path, message: &str) -> Result<(), StoreError> {
        let dir = dataset.join(METADATA_DIR);
        fs::create_dir_all(&dir)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(HISTORY_FILE))?;
        // One entry per line; embedded newlines would split a message.
        writeln!(file, "{}", message.replace('\n', " "))?;
        Ok(())
    }
}

impl VersionedDatasetStore for LocalStore {
    fn exists(&self, alias: &RiaAlias) -> Result<bool, StoreError> {
        Ok(self.dataset_path(alias).is_dir())
    }

    #[instrument(skip(self, alias), fields(alias = %alias))]
    fn create(&self, alias: &RiaAlias) -> Result<(), StoreError> {
        if self.exists(alias)? {
            return Err(StoreError::AlreadyExists {
                alias: alias.as_str().to_owned(),
            });
        }
        let dataset = self.dataset_path(alias);
        fs::create_dir_all(dataset.join(METADATA_DIR))?;
        Self::append_history(&dataset, "Create dataset")?;
        tracing::info!(path = %dataset.display(), "dataset created");
        Ok(())
    }

    #[instrument(skip(self, alias, dest), fields(alias = %alias, dest = %dest.display()))]
    fn clone_to(&self, alias: &RiaAlias, dest: &Path) -> Result<(), StoreError> {
        if !self.exists(alias)? {
            return Err(StoreError::NotFound {
                alias: alias.as_str().to_owned(),
            });
        }
        if dest.exists() {
            return Err(StoreError::DestinationExists {
                path: dest.to_path_buf(),
            });
        }
        copy_tree(&self.dataset_path(alias), dest, |_| false)?;
        let metadata = dest.join(METADATA_DIR);
        fs::create_dir_all(&metadata)?;
        fs::write(metadata.join(ORIGIN_FILE), format!("{alias}\n"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn finalize(&self, working_copy: &Path, message: &str) -> Result<(), StoreError> {
        let alias = Self::read_origin(working_copy)?;
        let dataset = self.dataset_path(&alias);
        let staging = self.root.join(format!(".{alias}.staging"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let origin = Path::new(METADATA_DIR).join(ORIGIN_FILE);
        copy_tree(working_copy, &staging, |rel| rel == origin)?;
        Self::append_history(&staging, message)?;

        if dataset.exists() {
            fs::remove_dir_all(&dataset)?;
        }
        fs::rename(&staging, &dataset)?;
        tracing::info!(alias = %alias, "working copy published");
        Ok(())
    }

    fn remove(&self, working_copy: &Path) -> Result<(), StoreError> {
        if working_copy.exists() {
            fs::remove_dir_all(working_copy)?;
        }
        Ok(())
    }
}

/// Copy `src` to `dst`, recreating symlinks as symlinks.
///
/// `skip` receives paths relative to `src`; skipped directories are not
/// descended into.
fn copy_tree(src: &Path, dst: &Path, skip: impl Fn(&Path) -> bool) -> Result<(), StoreError> {
    fs::create_dir_all(dst)?;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.path().strip_prefix(src).map_or(true, |rel| !skip(rel)));
    for entry in walker {
        let entry = entry.map_err(|source| StoreError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            {
                let _ = link;
                fs::copy(entry.path(), &target)?;
            }
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, LocalStore, RiaAlias) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("store"));
        let alias = RiaAlias::new("study-1_rawdata").unwrap();
        (dir, store, alias)
    }

    #[test]
    fn create_then_exists() {
        let (_dir, store, alias) = setup();
        assert!(!store.exists(&alias).unwrap());
        store.create(&alias).unwrap();
        assert!(store.exists(&alias).unwrap());
        assert_eq!(store.history(&alias).unwrap(), ["Create dataset"]);
    }

    #[test]
    fn create_twice_fails() {
        let (_dir, store, alias) = setup();
        store.create(&alias).unwrap();
        assert!(matches!(
            store.create(&alias),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn clone_of_unknown_alias_fails() {
        let (dir, store, alias) = setup();
        let err = store.clone_to(&alias, &dir.path().join("wc")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn finalize_publishes_changes_and_history() {
        let (dir, store, alias) = setup();
        store.create(&alias).unwrap();

        let wc = dir.path().join("wc");
        store.clone_to(&alias, &wc).unwrap();
        fs::create_dir_all(wc.join("sub-01/anat")).unwrap();
        fs::write(wc.join("sub-01/anat/sub-01_T1w.nii.gz"), "t1").unwrap();
        store.finalize(&wc, "Add sub-01").unwrap();
        store.remove(&wc).unwrap();
        assert!(!wc.exists());

        let stored = store.dataset_path(&alias);
        assert_eq!(
            fs::read_to_string(stored.join("sub-01/anat/sub-01_T1w.nii.gz")).unwrap(),
            "t1"
        );
        assert!(!stored.join(METADATA_DIR).join(ORIGIN_FILE).exists());
        assert_eq!(
            store.history(&alias).unwrap(),
            ["Create dataset", "Add sub-01"]
        );
    }

    #[test]
    fn removed_without_finalize_discards_changes() {
        let (dir, store, alias) = setup();
        store.create(&alias).unwrap();

        let wc = dir.path().join("wc");
        store.clone_to(&alias, &wc).unwrap();
        fs::write(wc.join("scratch.txt"), "x").unwrap();
        store.remove(&wc).unwrap();

        assert!(!store.dataset_path(&alias).join("scratch.txt").exists());
    }

    #[test]
    fn finalize_without_origin_marker_fails() {
        let (dir, store, _alias) = setup();
        let wc = dir.path().join("not-a-clone");
        fs::create_dir_all(&wc).unwrap();
        assert!(matches!(
            store.finalize(&wc, "nope"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn clone_preserves_symlinks() {
        let (dir, store, alias) = setup();
        store.create(&alias).unwrap();
        let stored = store.dataset_path(&alias);
        fs::write(stored.join("target.txt"), "data").unwrap();
        std::os::unix::fs::symlink("target.txt", stored.join("link.txt")).unwrap();

        let wc = dir.path().join("wc");
        store.clone_to(&alias, &wc).unwrap();
        let meta = fs::symlink_metadata(wc.join("link.txt")).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_to_string(wc.join("link.txt")).unwrap(), "data");
    }
}
