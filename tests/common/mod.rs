//! Shared test helpers for bidsync integration tests.
//!
//! All tests use temp directories. Each test builds its own incoming and
//! existing dataset trees via [`Datasets`].

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// An incoming and an existing dataset side by side in one temp directory.
pub struct Datasets {
    dir: TempDir,
    pub incoming: PathBuf,
    pub existing: PathBuf,
}

impl Datasets {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let incoming = dir.path().join("incoming");
        let existing = dir.path().join("existing");
        fs::create_dir_all(&incoming).unwrap();
        fs::create_dir_all(&existing).unwrap();
        Self {
            dir,
            incoming,
            existing,
        }
    }

    /// Scratch space next to the datasets (store roots, work dirs).
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Write `content` at `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
}

/// Read `root/rel` as UTF-8.
pub fn read(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Every file under `root` as `(relative path, content)`, sorted. Symlinks
/// are listed with their target prefixed by `-> `.
pub fn snapshot(root: &Path) -> Vec<(String, String)> {
    let mut out = Vec::new();
    collect(root, root, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, String)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let file_type = entry.file_type().unwrap();
        if file_type.is_symlink() {
            let target = fs::read_link(&path).unwrap();
            out.push((rel, format!("-> {}", target.display())));
        } else if file_type.is_dir() {
            collect(root, &path, out);
        } else {
            out.push((rel, fs::read_to_string(&path).unwrap_or_default()));
        }
    }
}

/// A small BIDS dataset with `subjects` subjects, one anatomical image
/// each, and a matching `participants.tsv`.
pub fn bids_dataset(root: &Path, subjects: &[&str]) {
    write(
        root,
        "dataset_description.json",
        r#"{"Name": "test", "BIDSVersion": "1.8.0"}"#,
    );
    let mut participants = String::from("participant_id\n");
    for sub in subjects {
        write(
            root,
            &format!("sub-{sub}/anat/sub-{sub}_T1w.nii.gz"),
            &format!("T1w {sub}"),
        );
        participants.push_str(&format!("sub-{sub}\n"));
    }
    write(root, "participants.tsv", &participants);
}
