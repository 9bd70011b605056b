//! The versioned dataset store trait.
//!
//! This is the API contract between the merge layer and whatever keeps the
//! authoritative copy of each dataset (a datalad RIA store in production, a
//! plain directory in tests). The merge layer never talks to the store
//! directly; it receives a local working copy and hands it back.

use std::path::Path;

use crate::alias::RiaAlias;
use crate::error::StoreError;

/// A store of versioned datasets addressed by [`RiaAlias`].
///
/// # Key Invariants
///
/// - **Exclusive working copies**: a path returned by [`clone_to`] belongs to
///   the caller until [`remove`] is called on it. The store never touches it
///   in between.
/// - **Publish on finalize only**: changes made to a working copy are not
///   visible to other clones until [`finalize`] succeeds. Removing a working
///   copy without finalizing discards its changes.
/// - **Serialized aliases**: at most one working copy per alias is mutated at
///   a time. Enforcing this is the caller's job.
///
/// [`clone_to`]: VersionedDatasetStore::clone_to
/// [`finalize`]: VersionedDatasetStore::finalize
/// [`remove`]: VersionedDatasetStore::remove
#[allow(clippy::missing_errors_doc)]
pub trait VersionedDatasetStore {
    /// Whether a dataset with this alias exists in the store.
    fn exists(&self, alias: &RiaAlias) -> Result<bool, StoreError>;

    /// Create an empty dataset under `alias` and publish it.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the alias is taken.
    fn create(&self, alias: &RiaAlias) -> Result<(), StoreError>;

    /// Materialize a working copy of `alias` at `dest`.
    ///
    /// `dest` must not exist; its parent must.
    fn clone_to(&self, alias: &RiaAlias, dest: &Path) -> Result<(), StoreError>;

    /// Record all changes in the working copy and push them to the store.
    fn finalize(&self, working_copy: &Path, message: &str) -> Result<(), StoreError>;

    /// Delete a working copy. Removing a path that no longer exists is a no-op.
    fn remove(&self, working_copy: &Path) -> Result<(), StoreError>;
}

impl<S: VersionedDatasetStore + ?Sized> VersionedDatasetStore for &S {
    fn exists(&self, alias: &RiaAlias) -> Result<bool, StoreError> {
        (**self).exists(alias)
    }

    fn create(&self, alias: &RiaAlias) -> Result<(), StoreError> {
        (**self).create(alias)
    }

    fn clone_to(&self, alias: &RiaAlias, dest: &Path) -> Result<(), StoreError> {
        (**self).clone_to(alias, dest)
    }

    fn finalize(&self, working_copy: &Path, message: &str) -> Result<(), StoreError> {
        (**self).finalize(working_copy, message)
    }

    fn remove(&self, working_copy: &Path) -> Result<(), StoreError> {
        (**self).remove(working_copy)
    }
}

impl<S: VersionedDatasetStore + ?Sized> VersionedDatasetStore for Box<S> {
    fn exists(&self, alias: &RiaAlias) -> Result<bool, StoreError> {
        (**self).exists(alias)
    }

    fn create(&self, alias: &RiaAlias) -> Result<(), StoreError> {
        (**self).create(alias)
    }

    fn clone_to(&self, alias: &RiaAlias, dest: &Path) -> Result<(), StoreError> {
        (**self).clone_to(alias, dest)
    }

    fn finalize(&self, working_copy: &Path, message: &str) -> Result<(), StoreError> {
        (**self).finalize(working_copy, message)
    }

    fn remove(&self, working_copy: &Path) -> Result<(), StoreError> {
        (**self).remove(working_copy)
    }
}
