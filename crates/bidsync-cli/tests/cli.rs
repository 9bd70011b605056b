//! End-to-end tests for the `bidsync` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn bidsync_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bidsync"))
        .args(args)
        .current_dir(dir)
        .env_remove("BIDSYNC_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run bidsync")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn merge_prints_json_report() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ex/participants.tsv", "participant_id\nsub-01\n");
    write(dir.path(), "in/participants.tsv", "participant_id\nsub-02\n");
    write(dir.path(), "in/sub-02/anat/sub-02_T1w.nii.gz", "t1");

    let out = bidsync_in(dir.path(), &["merge", "in", "ex", "--json"]);
    assert!(
        out.status.success(),
        "merge failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["copied_files"], 1);
    assert_eq!(report["participants"]["appended"][0], "sub-02");
    assert_eq!(
        fs::read_to_string(dir.path().join("ex/participants.tsv")).unwrap(),
        "participant_id\nsub-01\nsub-02\n"
    );
}

#[test]
fn merge_conflict_policy_error_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ex/README", "existing");
    write(dir.path(), "in/README", "incoming");

    let out = bidsync_in(dir.path(), &["merge", "in", "ex", "--on-conflict", "error"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("README"));
}

#[test]
fn conflict_policy_read_from_config() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bidsync.toml", "[merge]\non_conflict = \"error\"\n");
    write(dir.path(), "ex/README", "existing");
    write(dir.path(), "in/README", "incoming");

    let out = bidsync_in(dir.path(), &["merge", "in", "ex"]);
    assert!(!out.status.success());
}

#[test]
fn check_lists_excluded_names() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ex/sub-01/a.json", "");
    write(dir.path(), "in/sub-01/a.json", "");
    write(dir.path(), "in/sub-01/b.json", "");

    let out = bidsync_in(
        dir.path(),
        &["check", "in", "ex", "in/sub-01", "a.json", "b.json"],
    );
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "a.json\n");
}

#[test]
fn local_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("store");
    let work = dir.path().join("work");
    write(
        dir.path(),
        "bidsync.toml",
        &format!(
            "[store]\nkind = \"local\"\nlocal_root = {:?}\nwork_dir = {:?}\n",
            root.display().to_string(),
            work.display().to_string()
        ),
    );
    write(dir.path(), "in/sub-01/anat/sub-01_T1w.nii.gz", "t1");

    let out = bidsync_in(dir.path(), &["create", "study-3_rawdata"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = bidsync_in(dir.path(), &["sync", "study-3_rawdata", "in", "-m", "Add sub-01"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(root.join("study-3_rawdata/sub-01/anat/sub-01_T1w.nii.gz").is_file());

    let out = bidsync_in(dir.path(), &["wipe", "study-3_rawdata"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(!root.join("study-3_rawdata/sub-01").exists());
}

#[test]
fn tree_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ds/sub-01/anat/t1.nii.gz", "");

    let out = bidsync_in(dir.path(), &["tree", "ds"]);
    assert!(out.status.success());
    let tree: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(tree["dirs"]["sub-01"]["dirs"]["anat"]["files"][0], "t1.nii.gz");
}
