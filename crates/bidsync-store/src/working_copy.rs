//! Scoped working copies.
//!
//! [`WorkingCopy`] ties the lifetime of a cloned dataset to a Rust value:
//! the clone is made in [`WorkingCopy::acquire`] and removed when the guard
//! is released or dropped, whichever comes first. Publishing is always an
//! explicit [`WorkingCopy::finalize`] call, so an error path that unwinds
//! past the guard discards the clone without pushing anything.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::alias::RiaAlias;
use crate::error::StoreError;
use crate::store::VersionedDatasetStore;

/// A local clone of a store dataset, removed on drop.
pub struct WorkingCopy<'a, S: VersionedDatasetStore + ?Sized> {
    store: &'a S,
    alias: RiaAlias,
    path: PathBuf,
    released: bool,
}

impl<'a, S: VersionedDatasetStore + ?Sized> WorkingCopy<'a, S> {
    /// Clone `alias` into `parent/<alias>`.
    ///
    /// # Errors
    /// Propagates the store's clone error. Nothing is left behind on failure
    /// beyond what the store itself leaves.
    #[instrument(skip(store, alias, parent), fields(alias = %alias))]
    pub fn acquire(store: &'a S, alias: &RiaAlias, parent: &Path) -> Result<Self, StoreError> {
        let path = parent.join(alias.as_str());
        store.clone_to(alias, &path)?;
        tracing::debug!(path = %path.display(), "working copy acquired");
        Ok(Self {
            store,
            alias: alias.clone(),
            path,
            released: false,
        })
    }

    /// Root of the working copy on local disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn alias(&self) -> &RiaAlias {
        &self.alias
    }

    /// Commit and push the working copy's current state.
    ///
    /// # Errors
    /// Propagates the store's finalize error; the working copy is still
    /// removed when the guard goes out of scope.
    #[instrument(skip(self), fields(alias = %self.alias))]
    pub fn finalize(&self, message: &str) -> Result<(), StoreError> {
        self.store.finalize(&self.path, message)?;
        tracing::info!("working copy finalized");
        Ok(())
    }

    /// Remove the working copy now, surfacing any error.
    ///
    /// # Errors
    /// Propagates the store's remove error.
    pub fn release(mut self) -> Result<(), StoreError> {
        self.released = true;
        self.store.remove(&self.path)
    }
}

impl<S: VersionedDatasetStore + ?Sized> Drop for WorkingCopy<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.store.remove(&self.path) {
            tracing::warn!(
                alias = %self.alias,
                path = %self.path.display(),
                error = %e,
                "failed to remove working copy"
            );
        }
    }
}
