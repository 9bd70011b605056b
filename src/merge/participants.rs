//! `participants.tsv` merge.
//!
//! The participant registry is a tab-separated table whose first column is
//! the participant id. Merging is a keyed union in which the existing table
//! always wins: rows already known to it are never touched, and incoming
//! rows for unknown ids are appended in incoming order.
//!
//! # Example
//!
//! ```text
//! existing        incoming          merged
//! 02              participant_id    participant_id
//! 03              01                02
//!                 02                03
//!                                   01
//! ```
//!
//! The incoming table's first row is always treated as its header and never
//! merged as data. The merged table gets a `participant_id` header if its
//! first row does not already start with one.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::instrument;

use crate::error::MergeError;

/// First cell of a `participants.tsv` header row.
pub const PARTICIPANT_ID_HEADER: &str = "participant_id";

/// A parsed participant table.
///
/// No quoting or escaping: a row is a line split on tabs. Blank lines are
/// not rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticipantsTable {
    rows: Vec<Vec<String>>,
}

impl ParticipantsTable {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let rows = text
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.split('\t').map(str::to_owned).collect())
            .collect();
        Self { rows }
    }

    #[must_use]
    pub const fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Read and parse a table from disk.
    ///
    /// # Errors
    /// [`MergeError::Io`] if the file cannot be read.
    pub fn read(path: &Path) -> Result<Self, MergeError> {
        let text = fs::read_to_string(path).map_err(MergeError::io("read", path))?;
        Ok(Self::parse(&text))
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the first row's first cell starts with `participant_id`.
    #[must_use]
    pub fn has_header(&self) -> bool {
        self.rows
            .first()
            .and_then(|row| row.first())
            .is_some_and(|cell| cell.starts_with(PARTICIPANT_ID_HEADER))
    }

    /// First cell of every row, header included.
    pub fn first_cells(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(|row| row.first().map_or("", String::as_str))
    }

    /// Participant ids, header excluded.
    #[must_use]
    pub fn participant_ids(&self) -> Vec<&str> {
        let skip = usize::from(self.has_header());
        self.first_cells().skip(skip).collect()
    }

    /// Serialize: cells joined by tabs, every row newline-terminated.
    #[must_use]
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Replace the file at `path` with this table.
    ///
    /// # Errors
    /// [`MergeError::Io`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), MergeError> {
        fs::write(path, self.to_tsv()).map_err(MergeError::io("write", path))
    }
}

/// Outcome of merging two participant tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParticipantsMerge {
    /// The merged table.
    #[serde(skip)]
    pub table: ParticipantsTable,
    /// Incoming ids appended to the table, in order.
    pub appended: Vec<String>,
    /// Incoming ids dropped because the existing table already had them.
    pub discarded: Vec<String>,
    /// Whether a `participant_id` header had to be added.
    pub header_added: bool,
}

/// Merge `incoming` into `existing`.
///
/// Row 0 of `incoming` is skipped unconditionally. Every other incoming row
/// whose first cell is not already a first cell of `existing` (header
/// included) is appended; rows sharing an id with an earlier appended row are
/// appended too, matching a single pass over the incoming table against the
/// existing ids only.
#[must_use]
pub fn merge_tables(incoming: &ParticipantsTable, existing: ParticipantsTable) -> ParticipantsMerge {
    let known: HashSet<String> = existing.first_cells().map(str::to_owned).collect();
    let mut rows = existing.rows;
    let mut appended = Vec::new();
    let mut discarded = Vec::new();

    for row in incoming.rows.iter().skip(1) {
        let id = row.first().map_or("", String::as_str);
        if known.contains(id) {
            discarded.push(id.to_owned());
            continue;
        }
        appended.push(id.to_owned());
        rows.push(row.clone());
    }

    let mut table = ParticipantsTable { rows };
    let header_added = !table.has_header();
    if header_added {
        table
            .rows
            .insert(0, vec![PARTICIPANT_ID_HEADER.to_owned()]);
    }

    ParticipantsMerge {
        table,
        appended,
        discarded,
        header_added,
    }
}

/// Merge the table at `tsv_incoming` into the file at `tsv_existing`.
///
/// The existing file is fully rewritten. The incoming file is not modified.
///
/// # Errors
/// [`MergeError::Io`] if either file cannot be read or the existing file
/// cannot be written.
#[instrument(skip_all, fields(existing = %tsv_existing.display()))]
pub fn merge_participants_tsv(
    tsv_incoming: &Path,
    tsv_existing: &Path,
) -> Result<ParticipantsMerge, MergeError> {
    let incoming = ParticipantsTable::read(tsv_incoming)?;
    let existing = ParticipantsTable::read(tsv_existing)?;
    let merge = merge_tables(&incoming, existing);
    merge.table.write(tsv_existing)?;
    tracing::info!(
        appended = merge.appended.len(),
        discarded = merge.discarded.len(),
        header_added = merge.header_added,
        "participants merged"
    );
    Ok(merge)
}


#[cfg(test)]
mod proptests {
    use std::collections::{BTreeMap, BTreeSet};

    use proptest::prelude::*;

    use super::*;

    fn arb_id() -> impl Strategy<Value = String> {
        "sub-[0-9]{1,2}"
    }

    /// Rows keyed by unique id, each with one data column.
    fn arb_rows() -> impl Strategy<Value = BTreeMap<String, String>> {
        prop::collection::btree_map(arb_id(), "[a-z]{0,4}", 0..12)
    }

    fn to_table(header: bool, rows: &BTreeMap<String, String>) -> ParticipantsTable {
        let mut out = Vec::new();
        if header {
            out.push(vec![PARTICIPANT_ID_HEADER.to_owned(), "group".to_owned()]);
        }
        out.extend(rows.iter().map(|(id, v)| vec![id.clone(), v.clone()]));
        ParticipantsTable::from_rows(out)
    }

    proptest! {
        #[test]
        fn union_with_existing_precedence(
            existing in arb_rows(),
            incoming in arb_rows(),
            existing_header in any::<bool>(),
        ) {
            // The incoming table always carries a header (its row 0 is skipped).
            let merge = merge_tables(&to_table(true, &incoming), to_table(existing_header, &existing));
            let ids: BTreeSet<&str> = merge.table.participant_ids().into_iter().collect();
            let expected: BTreeSet<&str> = existing.keys().chain(incoming.keys()).map(String::as_str).collect();
            prop_assert_eq!(&ids, &expected);

            for row in merge.table.rows().iter().skip(1) {
                if let Some(value) = existing.get(&row[0]) {
                    prop_assert_eq!(&row[1], value);
                }
            }
        }

        #[test]
        fn header_exactly_once_at_top(
            existing in arb_rows(),
            incoming in arb_rows(),
            existing_header in any::<bool>(),
        ) {
            let merge = merge_tables(&to_table(true, &incoming), to_table(existing_header, &existing));
            let rows = merge.table.rows();
            prop_assert_eq!(rows[0][0].as_str(), PARTICIPANT_ID_HEADER);
            let headers = rows.iter().filter(|r| r[0] == PARTICIPANT_ID_HEADER).count();
            prop_assert_eq!(headers, 1);
            prop_assert_eq!(merge.header_added, !existing_header);
        }

        #[test]
        fn existing_rows_keep_their_positions(
            existing in arb_rows(),
            incoming in arb_rows(),
        ) {
            let before = to_table(true, &existing);
            let merge = merge_tables(&to_table(true, &incoming), before.clone());
            prop_assert_eq!(&merge.table.rows()[..before.rows().len()], before.rows());
        }
    }
}
