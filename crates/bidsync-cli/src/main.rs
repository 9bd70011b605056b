use std::path::PathBuf;

use anyhow::{Context, Result};
use bidsync::config::BidsyncConfig;
use bidsync::merge::{
    ConflictPolicy, DatasetMerger, EntryAction, MergeOptions, MergeReport, filter_existing,
    merge_participants_tsv,
};
use bidsync::sync::{self, SyncRequest};
use bidsync::tree::DirTree;
use bidsync_store::RiaAlias;
use clap::{Parser, Subcommand, ValueEnum};

mod telemetry;

/// Merge incoming BIDS datasets into versioned datasets
///
/// Incoming trees are merged into existing ones without ever overwriting a
/// file the destination already has. Merged entries are removed from the
/// incoming tree; whatever is left there afterwards was not merged.
///
/// STORE COMMANDS:
///
///   create, sync and wipe operate on datasets in the store selected by the
///   [store] section of the config file (datalad RIA store or a local
///   directory store). Each runs on a fresh working copy that is published
///   only if the operation succeeds and is removed either way.
#[derive(Parser)]
#[command(name = "bidsync")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'bidsync <command> --help' for more information on a specific command.")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "BIDSYNC_CONFIG", default_value = "bidsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge an incoming dataset tree into an existing one on local disk
    Merge {
        /// Root of the incoming dataset (merged entries are removed from it)
        incoming: PathBuf,
        /// Root of the existing dataset (modified in place)
        existing: PathBuf,
        /// How to treat top-level files present in both trees
        /// [default: from config, else report]
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictArg>,
        /// Print the merge report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge one participants.tsv into another
    ///
    /// Rows whose participant id the existing table already has are dropped.
    Participants {
        incoming: PathBuf,
        /// Rewritten in place
        existing: PathBuf,
    },

    /// List the entries of a directory that a merge would not copy
    Check {
        root_incoming: PathBuf,
        root_existing: PathBuf,
        /// Directory inside ROOT_INCOMING the names are relative to
        subdir: PathBuf,
        #[arg(required = true)]
        names: Vec<PathBuf>,
    },

    /// Print a directory tree as JSON
    Tree { path: PathBuf },

    /// Create a dataset in the store if it does not exist yet
    Create { alias: RiaAlias },

    /// Merge an incoming tree into a store dataset and publish the result
    Sync {
        alias: RiaAlias,
        incoming: PathBuf,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        /// How to treat top-level files present in both trees
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictArg>,
        /// Print the merge report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove all content from a store dataset and publish the result
    Wipe { alias: RiaAlias },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConflictArg {
    Report,
    Error,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Report => Self::Report,
            ConflictArg::Error => Self::Error,
        }
    }
}

fn main() -> Result<()> {
    telemetry::init(telemetry::LogFormat::from_env());
    let cli = Cli::parse();
    let config = BidsyncConfig::load(&cli.config)?;
    tracing::debug!(config = %cli.config.display(), store = %config.store.kind, "configuration loaded");

    match cli.command {
        Commands::Merge {
            incoming,
            existing,
            on_conflict,
            json,
        } => {
            let options = merge_options(&config, on_conflict);
            let report = DatasetMerger::new(options)
                .merge(&incoming, &existing)
                .with_context(|| {
                    format!(
                        "merging {} into {}",
                        incoming.display(),
                        existing.display()
                    )
                })?;
            print_report(&report, json)
        }
        Commands::Participants { incoming, existing } => {
            let merge = merge_participants_tsv(&incoming, &existing)?;
            println!(
                "{} appended, {} already present{}",
                merge.appended.len(),
                merge.discarded.len(),
                if merge.header_added {
                    ", header added"
                } else {
                    ""
                }
            );
            Ok(())
        }
        Commands::Check {
            root_incoming,
            root_existing,
            subdir,
            names,
        } => {
            for excluded in filter_existing(&root_incoming, &root_existing, &subdir, &names)? {
                println!("{}", excluded.display());
            }
            Ok(())
        }
        Commands::Tree { path } => {
            let tree = DirTree::scan(&path)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(())
        }
        Commands::Create { alias } => {
            let store = config.store.open()?;
            if sync::ensure_alias(&*store, &alias)? {
                println!("Created {alias}");
            } else {
                println!("{alias} already exists");
            }
            Ok(())
        }
        Commands::Sync {
            alias,
            incoming,
            message,
            on_conflict,
            json,
        } => {
            let store = config.store.open()?;
            let mut request = SyncRequest::new(alias, incoming);
            if let Some(message) = message {
                request = request.with_message(message);
            }
            let options = merge_options(&config, on_conflict);
            let report =
                sync::merge_into_alias(&*store, &config.store.work_dir, &request, &options)
                    .with_context(|| format!("syncing into {}", request.alias))?;
            print_report(&report, json)
        }
        Commands::Wipe { alias } => {
            let store = config.store.open()?;
            let removed = sync::wipe_alias(&*store, &config.store.work_dir, &alias)
                .with_context(|| format!("wiping {alias}"))?;
            println!("Removed {} entries from {alias}", removed.len());
            Ok(())
        }
    }
}

fn merge_options(config: &BidsyncConfig, on_conflict: Option<ConflictArg>) -> MergeOptions {
    let mut options = config.merge.clone();
    if let Some(arg) = on_conflict {
        options.on_conflict = arg.into();
    }
    options
}

fn print_report(report: &MergeReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for entry in &report.entries {
        let action = match entry.action {
            EntryAction::Merged => "merged",
            EntryAction::Reserved => "reserved",
            EntryAction::Conflict => "CONFLICT",
            EntryAction::Participants => "participants",
            EntryAction::Ignored => "ignored",
        };
        println!("  {action:<12} {}", entry.name);
    }
    println!(
        "{} file(s) copied, {} already present",
        report.copied_files,
        report.skipped.len()
    );
    if let Some(participants) = &report.participants {
        println!(
            "participants.tsv: {} appended, {} already present",
            participants.appended.len(),
            participants.discarded.len()
        );
    }
    let conflicts: Vec<&str> = report.conflicts().map(|e| e.name.as_str()).collect();
    if !conflicts.is_empty() {
        println!();
        println!("Left in the incoming tree (already present in destination):");
        for name in conflicts {
            println!("  {name}");
        }
    }
    Ok(())
}
