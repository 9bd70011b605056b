//! Dataset merge engine.
//!
//! Combines an incoming BIDS dataset tree into an existing one. The merge is
//! a move: every incoming entry that makes it into the destination is removed
//! from the incoming tree, and [`EntryOutcome::consumed`] records which ones
//! did. Destination files are never overwritten.
//!
//! # Phases
//!
//! 1. Snapshot the destination's top-level names.
//! 2. Walk incoming top-level entries in name order:
//!    - `code` and backend-managed entries are left alone.
//!    - Directories are tree-unioned into the destination (see
//!      [`existing::filter_existing`] for the per-file exclusion rule), then
//!      removed.
//!    - Files absent from the snapshot are copied, then removed.
//!    - Files present in the snapshot stay put. `participants.tsv` is handled
//!      in phase 3; anything else is a top-level conflict.
//! 3. Merge `participants.tsv` row-wise if the incoming copy is still there.
//!
//! There is no rollback. A failure leaves both trees partially updated and
//! the caller is expected to discard them.

mod copy;
pub mod existing;
pub mod participants;
pub mod report;

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::instrument;

use crate::dataset::{CODE_DIR, PARTICIPANTS_TSV, is_dataset_management_entry};
use crate::error::MergeError;
use copy::CopyStats;

pub use existing::filter_existing;
pub use participants::{ParticipantsMerge, ParticipantsTable, merge_participants_tsv};
pub use report::{ConflictPolicy, EntryAction, EntryKind, EntryOutcome, MergeReport};

/// Tunables for [`DatasetMerger`]. Also the `[merge]` section of
/// `bidsync.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeOptions {
    /// What to do when an incoming top-level file collides with an existing
    /// top-level entry.
    pub on_conflict: ConflictPolicy,
}

/// Merges one on-disk dataset tree into another.
#[derive(Clone, Debug, Default)]
pub struct DatasetMerger {
    options: MergeOptions,
}

impl DatasetMerger {
    #[must_use]
    pub const fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub const fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge `path_incoming` into `path_existing`.
    ///
    /// Both trees must be exclusively owned by the caller for the duration
    /// of the call. `path_existing` is mutated in place and merged entries
    /// are deleted from `path_incoming`.
    ///
    /// # Errors
    /// - [`MergeError::Io`] on the first filesystem failure. Entries handled
    ///   before it stay handled.
    /// - [`MergeError::TopLevelConflict`] under [`ConflictPolicy::Error`] if
    ///   any top-level file collided. Every other entry, and
    ///   `participants.tsv`, has been merged by then.
    #[instrument(skip_all, fields(
        incoming = %path_incoming.display(),
        existing = %path_existing.display()
    ))]
    pub fn merge(
        &self,
        path_incoming: &Path,
        path_existing: &Path,
    ) -> Result<MergeReport, MergeError> {
        let existing_names: HashSet<OsString> = entry_names(path_existing)?.into_iter().collect();
        let mut stats = CopyStats::default();
        let mut entries = Vec::new();

        for name in entry_names(path_incoming)? {
            let outcome = self.merge_entry(
                path_incoming,
                path_existing,
                &name,
                existing_names.contains(&name),
                &mut stats,
            )?;
            entries.push(outcome);
        }

        let tsv_incoming = path_incoming.join(PARTICIPANTS_TSV);
        let participants = if tsv_incoming.is_file() {
            Some(merge_participants_tsv(
                &tsv_incoming,
                &path_existing.join(PARTICIPANTS_TSV),
            )?)
        } else {
            None
        };

        let report = MergeReport {
            entries,
            skipped: stats.skipped,
            copied_files: stats.copied,
            participants,
        };
        tracing::info!(
            entries = report.entries.len(),
            consumed = report.consumed().len(),
            copied_files = report.copied_files,
            skipped = report.skipped.len(),
            "dataset merged"
        );

        if self.options.on_conflict == ConflictPolicy::Error && !report.is_clean() {
            return Err(MergeError::TopLevelConflict {
                names: report.conflicts().map(|e| e.name.clone()).collect(),
            });
        }
        Ok(report)
    }

    fn merge_entry(
        &self,
        path_incoming: &Path,
        path_existing: &Path,
        name: &OsStr,
        in_existing: bool,
        stats: &mut CopyStats,
    ) -> Result<EntryOutcome, MergeError> {
        let display_name = name.to_string_lossy().into_owned();
        let src = path_incoming.join(name);
        let is_link = fs::symlink_metadata(&src)
            .map_err(MergeError::io("stat", &src))?
            .file_type()
            .is_symlink();
        let kind = match fs::metadata(&src) {
            Ok(meta) if meta.is_dir() => EntryKind::Directory,
            Ok(meta) if meta.is_file() => EntryKind::File,
            _ => EntryKind::Other,
        };
        let outcome = |action, consumed| EntryOutcome {
            name: display_name.clone(),
            kind,
            action,
            consumed,
        };

        if display_name == CODE_DIR || is_dataset_management_entry(&display_name) {
            tracing::debug!(entry = %display_name, "reserved entry left in place");
            return Ok(outcome(EntryAction::Reserved, false));
        }

        match kind {
            EntryKind::Directory => {
                copy::merge_tree(path_incoming, path_existing, &src, stats)?;
                if is_link {
                    fs::remove_file(&src).map_err(MergeError::io("remove", &src))?;
                } else {
                    fs::remove_dir_all(&src).map_err(MergeError::io("remove", &src))?;
                }
                tracing::debug!(entry = %display_name, "directory merged");
                Ok(outcome(EntryAction::Merged, true))
            }
            EntryKind::File if !in_existing => {
                copy::copy_file(&src, &path_existing.join(name))?;
                stats.copied += 1;
                fs::remove_file(&src).map_err(MergeError::io("remove", &src))?;
                tracing::debug!(entry = %display_name, "file merged");
                Ok(outcome(EntryAction::Merged, true))
            }
            EntryKind::File if display_name == PARTICIPANTS_TSV => {
                Ok(outcome(EntryAction::Participants, false))
            }
            EntryKind::File => {
                tracing::warn!(
                    entry = %display_name,
                    policy = %self.options.on_conflict,
                    "top-level file already exists in destination; incoming copy left in place"
                );
                Ok(outcome(EntryAction::Conflict, false))
            }
            EntryKind::Other => {
                tracing::warn!(entry = %display_name, "neither file nor directory; ignored");
                Ok(outcome(EntryAction::Ignored, false))
            }
        }
    }
}

/// Top-level entry names of `dir`, sorted.
fn entry_names(dir: &Path) -> Result<Vec<OsString>, MergeError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(MergeError::io("read", dir))? {
        let entry = entry.map_err(MergeError::io("read", dir))?;
        names.push(entry.file_name());
    }
    names.sort();
    Ok(names)
}
