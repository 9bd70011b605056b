//! Versioned dataset store layer for bidsync.
//!
//! This crate defines the [`VersionedDatasetStore`] trait, the single
//! interface through which the merge layer obtains and publishes working
//! copies of datasets kept in a RIA store. Nothing above this crate runs
//! `datalad` directly.
//!
//! # Crate layout
//!
//! - [`store`]: the [`VersionedDatasetStore`] trait.
//! - [`working_copy`]: [`WorkingCopy`], the scoped clone guard.
//! - [`alias`]: [`RiaAlias`] and [`DatasetType`].
//! - [`datalad`]: [`DataladStore`], backed by the `datalad` CLI.
//! - [`local`]: [`LocalStore`], backed by plain directories.
//! - [`error`]: the [`StoreError`] enum returned by all store methods.

pub mod alias;
pub mod datalad;
pub mod error;
pub mod local;
pub mod store;
pub mod working_copy;

pub use alias::{DatasetType, RiaAlias};
pub use datalad::DataladStore;
pub use error::StoreError;
pub use local::LocalStore;
pub use store::VersionedDatasetStore;
pub use working_copy::WorkingCopy;
