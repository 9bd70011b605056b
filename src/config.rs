//! bidsync configuration (`bidsync.toml`).
//!
//! Selects the versioned dataset store and sets merge policy. Every field has
//! a default, so an absent file is a valid configuration.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use bidsync_store::{DataladStore, LocalStore, VersionedDatasetStore};
use serde::Deserialize;
use thiserror::Error;

use crate::merge::MergeOptions;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BidsyncConfig {
    /// Store backend settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Merge settings.
    #[serde(default)]
    pub merge: MergeOptions,
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Where datasets live and how to reach them.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// RIA store URL (`ria+file://...`, `ria+ssh://...`). Required for the
    /// datalad store.
    #[serde(default)]
    pub ria_url: Option<String>,

    /// Scratch space for working copies.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// The `datalad` executable.
    #[serde(default = "default_datalad")]
    pub datalad: String,

    /// Root directory of the local store. Required for the local store.
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            ria_url: None,
            work_dir: default_work_dir(),
            datalad: default_datalad(),
            local_root: None,
        }
    }
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("bidsync")
}

fn default_datalad() -> String {
    "datalad".to_owned()
}

/// The store backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    /// datalad datasets published to a RIA store.
    #[default]
    Datalad,
    /// Plain directories under `local_root`.
    Local,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datalad => write!(f, "datalad"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl StoreConfig {
    /// Build the configured store.
    ///
    /// # Errors
    /// Returns `ConfigError` if the selected backend's location is not set.
    pub fn open(&self) -> Result<Box<dyn VersionedDatasetStore>, ConfigError> {
        match self.kind {
            StoreKind::Datalad => {
                let ria_url =
                    self.ria_url
                        .as_deref()
                        .ok_or(ConfigError::MissingLocation {
                            kind: self.kind,
                            field: "ria_url",
                        })?;
                Ok(Box::new(
                    DataladStore::new(ria_url, self.work_dir.clone())
                        .with_executable(&self.datalad),
                ))
            }
            StoreKind::Local => {
                let root = self
                    .local_root
                    .clone()
                    .ok_or(ConfigError::MissingLocation {
                        kind: self.kind,
                        field: "local_root",
                    })?;
                Ok(Box::new(LocalStore::new(root)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading `bidsync.toml` or building the store it selects.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("{}: could not read file: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid TOML, an unknown field or a value of the wrong type.
    #[error("{}{message}", location(path.as_deref(), *line))]
    Invalid {
        /// The file being parsed, unset when parsing a string.
        path: Option<PathBuf>,
        /// 1-based line of the offending item, when toml reports a span.
        line: Option<usize>,
        message: String,
    },

    /// The selected backend has no location configured.
    #[error("store.{field} is required when store.kind = \"{kind}\"")]
    MissingLocation { kind: StoreKind, field: &'static str },
}

fn location(path: Option<&Path>, line: Option<usize>) -> String {
    match (path, line) {
        (Some(p), Some(l)) => format!("{}: line {l}: ", p.display()),
        (Some(p), None) => format!("{}: ", p.display()),
        (None, Some(l)) => format!("config error: line {l}: "),
        (None, None) => "config error: ".to_owned(),
    }
}

impl BidsyncConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors other than not-found, and on
    /// invalid TOML or unknown fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        Self::parse_at(&contents, Some(path))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Self::parse_at(toml_str, None)
    }

    fn parse_at(toml_str: &str, path: Option<&Path>) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Invalid {
            path: path.map(Path::to_path_buf),
            line: e
                .span()
                .map(|span| toml_str[..span.start].matches('\n').count() + 1),
            message: e.message().to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConflictPolicy;

    #[test]
    fn defaults_all_fields() {
        let cfg = BidsyncConfig::default();
        assert_eq!(cfg.store.kind, StoreKind::Datalad);
        assert_eq!(cfg.store.ria_url, None);
        assert_eq!(cfg.store.datalad, "datalad");
        assert!(cfg.store.work_dir.ends_with("bidsync"));
        assert_eq!(cfg.merge.on_conflict, ConflictPolicy::Report);
    }

    #[test]
    fn empty_string_is_defaults() {
        assert_eq!(BidsyncConfig::parse("").unwrap(), BidsyncConfig::default());
    }

    #[test]
    fn full_config() {
        let cfg = BidsyncConfig::parse(
            r#"
[store]
kind = "datalad"
ria_url = "ria+file:///data/ria"
work_dir = "/scratch/bidsync"
datalad = "/opt/datalad/bin/datalad"

[merge]
on_conflict = "error"
"#,
        )
        .unwrap();
        assert_eq!(cfg.store.ria_url.as_deref(), Some("ria+file:///data/ria"));
        assert_eq!(cfg.store.work_dir, PathBuf::from("/scratch/bidsync"));
        assert_eq!(cfg.store.datalad, "/opt/datalad/bin/datalad");
        assert_eq!(cfg.merge.on_conflict, ConflictPolicy::Error);
    }

    #[test]
    fn unknown_field_reports_line() {
        let err = BidsyncConfig::parse("[store]\nkind = \"local\"\nbogus = 1\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { line: Some(3), path: None, .. }),
            "{err:?}"
        );
        assert!(err.to_string().starts_with("config error: line 3: "), "{err}");
    }

    #[test]
    fn unknown_store_kind_rejected() {
        assert!(BidsyncConfig::parse("[store]\nkind = \"s3\"\n").is_err());
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BidsyncConfig::load(&dir.path().join("bidsync.toml")).unwrap();
        assert_eq!(cfg, BidsyncConfig::default());
    }

    #[test]
    fn load_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bidsync.toml");
        std::fs::write(&path, "[merge]\non_conflict = \"panic\"\n").unwrap();
        let err = BidsyncConfig::load(&path).unwrap_err();
        match &err {
            ConfigError::Invalid { path: Some(p), .. } => assert_eq!(p, &path),
            other => panic!("expected invalid config, got {other:?}"),
        }
        assert!(err.to_string().contains("bidsync.toml: "), "{err}");
    }

    #[test]
    fn unreadable_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BidsyncConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "{err:?}");
        assert!(err.to_string().contains("could not read file"));
    }

    #[test]
    fn open_requires_location() {
        let datalad = StoreConfig::default();
        let err = datalad.open().err().expect("datalad store without ria_url");
        assert!(matches!(
            err,
            ConfigError::MissingLocation {
                kind: StoreKind::Datalad,
                field: "ria_url"
            }
        ));
        assert_eq!(
            err.to_string(),
            "store.ria_url is required when store.kind = \"datalad\""
        );

        let local = StoreConfig {
            kind: StoreKind::Local,
            ..StoreConfig::default()
        };
        assert!(matches!(
            local.open().err(),
            Some(ConfigError::MissingLocation {
                field: "local_root",
                ..
            })
        ));
    }

    #[test]
    fn open_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StoreConfig {
            kind: StoreKind::Local,
            local_root: Some(dir.path().to_path_buf()),
            ..StoreConfig::default()
        };
        let store = cfg.open().unwrap();
        let alias = bidsync_store::RiaAlias::new("study-1_rawdata").unwrap();
        assert!(!store.exists(&alias).unwrap());
    }

    #[test]
    fn store_kind_display() {
        assert_eq!(StoreKind::Datalad.to_string(), "datalad");
        assert_eq!(StoreKind::Local.to_string(), "local");
    }
}
