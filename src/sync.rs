//! Store-backed merge orchestration.
//!
//! Ties the merge engine to a [`VersionedDatasetStore`]: clone the alias into
//! scratch space, mutate the clone, publish it, throw it away. The clone is
//! held by a [`WorkingCopy`] guard, so it is removed on every exit path and
//! only ever published after the mutation succeeded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bidsync_store::{RiaAlias, StoreError, VersionedDatasetStore, WorkingCopy};
use thiserror::Error;
use tracing::instrument;

use crate::dataset::wipe_contents;
use crate::error::MergeError;
use crate::merge::{DatasetMerger, MergeOptions, MergeReport};

/// Commit message used when a [`SyncRequest`] does not set one.
pub const DEFAULT_SYNC_MESSAGE: &str = "Merge incoming dataset.";

/// Commit message for [`wipe_alias`].
pub const WIPE_MESSAGE: &str = "Wipe dataset contents.";

/// Errors from store-backed operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The scratch directory for the working copy could not be prepared.
    #[error("prepare scratch space in {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One incoming tree to merge into one store dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    pub alias: RiaAlias,
    /// Root of the incoming dataset tree. Consumed by the merge.
    pub incoming: PathBuf,
    /// Commit message for the published result.
    pub message: String,
}

impl SyncRequest {
    #[must_use]
    pub fn new(alias: RiaAlias, incoming: impl Into<PathBuf>) -> Self {
        Self {
            alias,
            incoming: incoming.into(),
            message: DEFAULT_SYNC_MESSAGE.to_owned(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Create `alias` in the store unless it already exists. Returns whether it
/// was created.
///
/// # Errors
/// Propagates store errors.
pub fn ensure_alias<S>(store: &S, alias: &RiaAlias) -> Result<bool, StoreError>
where
    S: VersionedDatasetStore + ?Sized,
{
    if store.exists(alias)? {
        tracing::debug!(alias = %alias, "dataset already exists");
        return Ok(false);
    }
    store.create(alias)?;
    tracing::info!(alias = %alias, "dataset created");
    Ok(true)
}

/// Merge `request.incoming` into the store dataset `request.alias` and
/// publish the result.
///
/// The working copy lives in a fresh temporary directory under `work_dir`.
/// If the merge fails (including a [`MergeError::TopLevelConflict`] under the
/// `error` policy) nothing is published; the stored dataset is unchanged and
/// remains the recovery point.
///
/// # Errors
/// - [`SyncError::Scratch`] if `work_dir` cannot be prepared.
/// - [`SyncError::Store`] if cloning, publishing or cleanup fails.
/// - [`SyncError::Merge`] if the merge itself fails.
#[instrument(skip_all, fields(alias = %request.alias, incoming = %request.incoming.display()))]
pub fn merge_into_alias<S>(
    store: &S,
    work_dir: &Path,
    request: &SyncRequest,
    options: &MergeOptions,
) -> Result<MergeReport, SyncError>
where
    S: VersionedDatasetStore + ?Sized,
{
    let scratch = scratch_dir(work_dir)?;
    let working_copy = WorkingCopy::acquire(store, &request.alias, scratch.path())?;
    let report = DatasetMerger::new(options.clone()).merge(&request.incoming, working_copy.path())?;
    working_copy.finalize(&request.message)?;
    working_copy.release()?;
    Ok(report)
}

/// Delete all payload from the store dataset `alias` and publish the empty
/// dataset. Returns the removed top-level names.
///
/// # Errors
/// As [`merge_into_alias`].
#[instrument(skip_all, fields(alias = %alias))]
pub fn wipe_alias<S>(store: &S, work_dir: &Path, alias: &RiaAlias) -> Result<Vec<String>, SyncError>
where
    S: VersionedDatasetStore + ?Sized,
{
    let scratch = scratch_dir(work_dir)?;
    let working_copy = WorkingCopy::acquire(store, alias, scratch.path())?;
    let removed = wipe_contents(working_copy.path())?;
    working_copy.finalize(WIPE_MESSAGE)?;
    working_copy.release()?;
    Ok(removed)
}

fn scratch_dir(work_dir: &Path) -> Result<tempfile::TempDir, SyncError> {
    let scratch_err = |source| SyncError::Scratch {
        path: work_dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(work_dir).map_err(scratch_err)?;
    tempfile::Builder::new()
        .prefix("bidsync-")
        .tempdir_in(work_dir)
        .map_err(scratch_err)
}
