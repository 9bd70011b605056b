//! Datalad-backed store.
//!
//! Drives the `datalad` executable against a RIA store. Working copies are
//! ephemeral clones (`--reckless ephemeral`), so annexed content is shared
//! with the store instead of copied, and removal is reckless as well.
//!
//! # Command mapping
//!
//! ```text
//! create    datalad create -c text2git <tmp>/<alias>
//!           datalad create-sibling-ria -d <tmp>/<alias> -s origin --alias <alias> --new-store-ok <ria>
//!           (push)
//! clone     datalad clone <ria>#~<alias> <dest> --reckless ephemeral
//! finalize  datalad save -d <wc> -m <message>
//!           (push)
//! push      git annex dead here
//!           datalad push -d <wc> --data anything --to origin
//! remove    datalad remove -d <wc> --reckless modification
//! exists    test -e <store>/alias/<alias>              (ria+file://)
//!           ssh [-p port] <host> test -e <path>/alias/<alias>  (ria+ssh://)
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::instrument;

use crate::alias::RiaAlias;
use crate::error::StoreError;
use crate::store::VersionedDatasetStore;

/// Name of the RIA sibling every dataset pushes to.
const SIBLING: &str = "origin";

/// A [`VersionedDatasetStore`] backed by a datalad RIA store.
#[derive(Clone, Debug)]
pub struct DataladStore {
    /// RIA URL, e.g. `ria+file:///data/ria` or `ria+ssh://host/ria`.
    ria_url: String,
    /// Directory for scratch datasets made during `create`.
    work_dir: PathBuf,
    /// The `datalad` executable.
    executable: OsString,
    /// The `ssh` executable, used to query `ria+ssh://` stores.
    ssh: OsString,
}

/// Where the RIA store lives, as far as existence checks are concerned.
#[derive(Debug, PartialEq, Eq)]
enum StoreLocation {
    File(PathBuf),
    Ssh {
        /// `[user@]host`
        destination: String,
        port: Option<String>,
        path: String,
    },
    /// Schemes with no cheap way to list aliases (`ria+http://`, ...).
    Unsupported,
}

impl StoreLocation {
    fn parse(ria_url: &str) -> Self {
        if let Some(root) = ria_url.strip_prefix("ria+file://") {
            return Self::File(PathBuf::from(root));
        }
        let Some(rest) = ria_url.strip_prefix("ria+ssh://") else {
            return Self::Unsupported;
        };
        let (authority, path) = rest.find('/').map_or((rest, "/"), |i| rest.split_at(i));
        if authority.is_empty() {
            return Self::Unsupported;
        }
        let (destination, port) = match authority.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                (host, Some(port.to_owned()))
            }
            _ => (authority, None),
        };
        Self::Ssh {
            destination: destination.to_owned(),
            port,
            path: path.to_owned(),
        }
    }
}

impl DataladStore {
    #[must_use]
    pub fn new(ria_url: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            ria_url: ria_url.into(),
            work_dir: work_dir.into(),
            executable: OsString::from("datalad"),
            ssh: OsString::from("ssh"),
        }
    }

    /// Use a different `ssh` executable for `ria+ssh://` existence checks.
    #[must_use]
    pub fn with_ssh(mut self, ssh: impl Into<OsString>) -> Self {
        self.ssh = ssh.into();
        self
    }

    /// Use a different `datalad` executable (absolute path or name on `PATH`).
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<OsString>) -> Self {
        self.executable = executable.into();
        self
    }

    #[must_use]
    pub fn ria_url(&self) -> &str {
        &self.ria_url
    }

    /// The clone source for an alias: `<ria>#~<alias>`.
    #[must_use]
    pub fn clone_source(&self, alias: &RiaAlias) -> String {
        format!("{}#~{}", self.ria_url, alias.as_str())
    }

    /// Ask the store host whether `<path>/alias/<alias>` exists.
    ///
    /// `test -e` exits 1 for a missing path; ssh itself uses 255, so any
    /// other status is a failure to check.
    fn remote_alias_exists(
        &self,
        destination: &str,
        port: Option<&str>,
        path: &str,
        alias: &RiaAlias,
    ) -> Result<bool, StoreError> {
        let target = format!("{}/alias/{}", path.trim_end_matches('/'), alias.as_str());
        let quoted = shell_quote(&target);
        let mut args: Vec<OsString> = Vec::new();
        if let Some(port) = port {
            args.extend(["-p", port].map(OsString::from));
        }
        args.extend([destination, "test", "-e", quoted.as_str()].map(OsString::from));
        let output = Command::new(&self.ssh).args(&args).output()?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error(&self.ssh, &args, &output)),
        }
    }

    fn datalad<I, A>(&self, args: I, cwd: Option<&Path>) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        run(&self.executable, &args, cwd)
    }

    fn push(&self, dataset: &Path) -> Result<(), StoreError> {
        tracing::debug!(dataset = %dataset.display(), "marking local annex dead");
        run(
            OsStr::new("git"),
            &["annex", "dead", "here"].map(OsString::from),
            Some(dataset),
        )?;
        tracing::debug!(dataset = %dataset.display(), "pushing to RIA sibling");
        self.datalad(
            [
                OsStr::new("push"),
                OsStr::new("-d"),
                dataset.as_os_str(),
                OsStr::new("--data"),
                OsStr::new("anything"),
                OsStr::new("--to"),
                OsStr::new(SIBLING),
            ],
            None,
        )
    }
}

impl VersionedDatasetStore for DataladStore {
    /// Consults the store's alias index (`<store>/alias/<alias>`), directly
    /// for `ria+file://` stores and over ssh for `ria+ssh://` ones.
    fn exists(&self, alias: &RiaAlias) -> Result<bool, StoreError> {
        match StoreLocation::parse(&self.ria_url) {
            StoreLocation::File(root) => Ok(root.join("alias").join(alias.as_str()).exists()),
            StoreLocation::Ssh {
                destination,
                port,
                path,
            } => self.remote_alias_exists(&destination, port.as_deref(), &path, alias),
            StoreLocation::Unsupported => Err(StoreError::Command {
                command: format!("exists {}", self.clone_source(alias)),
                stderr: "existence checks need a ria+file:// or ria+ssh:// store".to_owned(),
                exit_code: None,
            }),
        }
    }

    #[instrument(skip(self, alias), fields(alias = %alias))]
    fn create(&self, alias: &RiaAlias) -> Result<(), StoreError> {
        let checkable = StoreLocation::parse(&self.ria_url) != StoreLocation::Unsupported;
        if checkable && self.exists(alias)? {
            return Err(StoreError::AlreadyExists {
                alias: alias.as_str().to_owned(),
            });
        }
        std::fs::create_dir_all(&self.work_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix("bidsync-create-")
            .tempdir_in(&self.work_dir)?;
        let dataset = scratch.path().join(alias.as_str());

        self.datalad(
            [
                OsStr::new("create"),
                OsStr::new("-c"),
                OsStr::new("text2git"),
                dataset.as_os_str(),
            ],
            None,
        )?;
        self.datalad(
            [
                OsStr::new("create-sibling-ria"),
                OsStr::new("-d"),
                dataset.as_os_str(),
                OsStr::new("-s"),
                OsStr::new(SIBLING),
                OsStr::new("--alias"),
                OsStr::new(alias.as_str()),
                OsStr::new("--new-store-ok"),
                OsStr::new(&self.ria_url),
            ],
            None,
        )?;
        self.push(&dataset)?;
        tracing::info!("dataset created in RIA store");
        Ok(())
    }

    #[instrument(skip(self, alias, dest), fields(alias = %alias, dest = %dest.display()))]
    fn clone_to(&self, alias: &RiaAlias, dest: &Path) -> Result<(), StoreError> {
        if dest.exists() {
            return Err(StoreError::DestinationExists {
                path: dest.to_path_buf(),
            });
        }
        let source = self.clone_source(alias);
        tracing::info!(source = %source, "cloning dataset");
        self.datalad(
            [
                OsStr::new("clone"),
                OsStr::new(&source),
                dest.as_os_str(),
                OsStr::new("--reckless"),
                OsStr::new("ephemeral"),
            ],
            None,
        )
    }

    #[instrument(skip(self))]
    fn finalize(&self, working_copy: &Path, message: &str) -> Result<(), StoreError> {
        self.datalad(
            [
                OsStr::new("save"),
                OsStr::new("-d"),
                working_copy.as_os_str(),
                OsStr::new("-m"),
                OsStr::new(message),
            ],
            None,
        )?;
        self.push(working_copy)
    }

    fn remove(&self, working_copy: &Path) -> Result<(), StoreError> {
        if !working_copy.exists() {
            return Ok(());
        }
        self.datalad(
            [
                OsStr::new("remove"),
                OsStr::new("-d"),
                working_copy.as_os_str(),
                OsStr::new("--reckless"),
                OsStr::new("modification"),
            ],
            None,
        )
    }
}

/// Run `program args...`, mapping a non-zero exit to [`StoreError::Command`].
fn run(program: &OsStr, args: &[OsString], cwd: Option<&Path>) -> Result<(), StoreError> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output()?;
    if output.status.success() {
        return Ok(());
    }
    Err(command_error(program, args, &output))
}

fn command_error(program: &OsStr, args: &[OsString], output: &Output) -> StoreError {
    let command = std::iter::once(program)
        .chain(args.iter().map(OsString::as_os_str))
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    StoreError::Command {
        command,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        exit_code: output.status.code(),
    }
}

/// Single-quote `s` for the remote shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
