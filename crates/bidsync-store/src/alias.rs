//! RIA alias and dataset-type value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The kind of dataset a study keeps in the RIA store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetType {
    /// Raw scanner archives (tar files).
    SourceData,
    /// BIDS-converted data.
    RawData,
    /// Derivatives such as gradient-corrected images.
    DerivedData,
}

impl DatasetType {
    /// BIDS-style name used when building aliases.
    #[must_use]
    pub const fn as_bids_str(self) -> &'static str {
        match self {
            Self::SourceData => "sourcedata",
            Self::RawData => "rawdata",
            Self::DerivedData => "deriveddata",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_bids_str())
    }
}

/// Name of a dataset inside a RIA store.
///
/// Aliases become directory names for working copies, so they must be a
/// single non-empty path component without whitespace.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RiaAlias(String);

impl RiaAlias {
    /// Validate and wrap an alias.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidAlias`] if the alias is empty, is `.` or
    /// `..`, or contains a path separator or whitespace.
    pub fn new(s: &str) -> Result<Self, StoreError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Alias of a study's dataset of the given type, e.g. `study-12_rawdata`.
    #[must_use]
    pub fn for_study(study_id: u64, dataset_type: DatasetType) -> Self {
        Self(format!("study-{study_id}_{}", dataset_type.as_bids_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), StoreError> {
        let invalid = |reason: &str| StoreError::InvalidAlias {
            value: s.to_owned(),
            reason: reason.to_owned(),
        };
        if s.is_empty() {
            return Err(invalid("alias must not be empty"));
        }
        if s == "." || s == ".." {
            return Err(invalid("alias must not be a relative path component"));
        }
        if s.contains('/') || s.contains('\\') {
            return Err(invalid("alias must not contain path separators"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("alias must not contain whitespace"));
        }
        Ok(())
    }
}

impl fmt::Display for RiaAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RiaAlias {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RiaAlias {
    type Error = StoreError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<RiaAlias> for String {
    fn from(alias: RiaAlias) -> Self {
        alias.0
    }
}
