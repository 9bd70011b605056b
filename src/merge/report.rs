//! What a dataset merge did, entry by entry.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::participants::ParticipantsMerge;

/// What a top-level incoming entry was.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Directory,
    File,
    /// Dangling symlinks, sockets, fifos, and anything else.
    Other,
}

/// What the merge did with a top-level incoming entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    /// Copied (or tree-unioned) into the destination.
    Merged,
    /// `code` or a backend-managed entry; left untouched.
    Reserved,
    /// A file whose name the destination already had at the top level.
    /// Left in the incoming tree for manual attention.
    Conflict,
    /// `participants.tsv` colliding with the destination's; merged row-wise
    /// after all other entries.
    Participants,
    /// Neither a file nor a directory; left untouched.
    Ignored,
}

/// The fate of one top-level incoming entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub name: String,
    pub kind: EntryKind,
    pub action: EntryAction,
    /// Whether the entry was removed from the incoming tree.
    pub consumed: bool,
}

/// How to treat top-level file collisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Record the collision in the report and succeed.
    #[default]
    Report,
    /// Finish the merge, then fail with
    /// [`MergeError::TopLevelConflict`](crate::error::MergeError::TopLevelConflict).
    Error,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Report => write!(f, "report"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Summary of a completed merge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// One outcome per top-level incoming entry, sorted by name.
    pub entries: Vec<EntryOutcome>,
    /// Incoming-relative paths inside merged directories that were not
    /// copied because the destination already had them. These are gone
    /// from the incoming tree once their directory is consumed.
    pub skipped: Vec<PathBuf>,
    /// Number of files written to the destination.
    pub copied_files: usize,
    /// Row-level result of the `participants.tsv` merge, if one ran.
    pub participants: Option<ParticipantsMerge>,
}

impl MergeReport {
    /// Entries left in place because of a top-level name collision.
    pub fn conflicts(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries
            .iter()
            .filter(|e| e.action == EntryAction::Conflict)
    }

    /// Whether no top-level collision was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts().next().is_none()
    }

    /// Names of the entries removed from the incoming tree.
    #[must_use]
    pub fn consumed(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.consumed)
            .map(|e| e.name.as_str())
            .collect()
    }
}
