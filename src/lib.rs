//! bidsync library crate.
//!
//! Merges incoming BIDS dataset trees into existing ones and publishes the
//! result through a versioned dataset store. The `bidsync` binary in
//! `crates/bidsync-cli` is a thin front end over these modules.
//!
//! - [`merge`]: the merge engine ([`merge::DatasetMerger`]) with its
//!   existence check and `participants.tsv` merge.
//! - [`dataset`]: reserved names and whole-dataset housekeeping.
//! - [`sync`]: merge and wipe wrapped in a scoped store working copy.
//! - [`tree`]: serializable directory listings.
//! - [`config`]: `bidsync.toml`.

pub mod config;
pub mod dataset;
pub mod error;
pub mod merge;
pub mod sync;
pub mod tree;

pub use error::MergeError;
