//! Binary entry point for keepset.
//!
//! This binary provides the CLI interface for the keepset retention engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use keepset::cli::{self, HookEvent, OutputFormat};
use keepset::config::KeepsetConfig;
use keepset::observability::{self, InitOptions};
use keepset::prune::{ArchivePurgeOptions, DEFAULT_ARCHIVE_LIMIT, RetentionPruner};
use keepset::storage::SqliteVersionStore;
use keepset::{RecordId, TypeName};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Keepset - retention policies for versioned records.
#[derive(Parser)]
#[command(name = "keepset")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database, overriding the configuration.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Output format: text or json.
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Print Prometheus metrics to stderr when the command finishes.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Prune every live record of the given types with their configured policy.
    Prune {
        /// Types to prune (repeatable).
        #[arg(short = 't', long = "type", required = true)]
        types: Vec<String>,

        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Reduce every live record of the given types to its live version and draft.
    Reset {
        /// Types to reset (repeatable).
        #[arg(short = 't', long = "type", required = true)]
        types: Vec<String>,

        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Prune a single record.
    Record {
        /// The record ID.
        id: i64,

        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete version rows of records that no longer exist.
    Orphans {
        /// Type whose orphans are removed (defaults to the base type).
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Purge the history of archived records.
    Archived {
        /// Type whose archived records are purged (defaults to the base type).
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Only purge records last edited more than this many days ago.
        #[arg(long)]
        older_than_days: Option<u32>,

        /// Maximum number of records purged per run.
        #[arg(short, long, default_value_t = DEFAULT_ARCHIVE_LIMIT)]
        limit: usize,

        /// Show what would be deleted without deleting.
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect or extend the type hierarchy.
    Types {
        #[command(subcommand)]
        action: TypesAction,
    },

    /// Show the effective configuration.
    Config,

    /// Handle a lifecycle hook, reading the event JSON from stdin.
    Hook {
        /// Hook event: publish.
        event: String,
    },
}

/// Type hierarchy commands.
#[derive(Subcommand)]
enum TypesAction {
    /// List registered types.
    List,

    /// Register a subtype.
    Add {
        /// Name of the new type.
        name: String,

        /// Existing parent type.
        #[arg(short, long)]
        parent: String,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
            metrics: cli.metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = run_command(cli, config);

    if let Some(rendered) = observability.render_metrics() {
        eprint!("{rendered}");
    }

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
///
/// Returns `Ok(false)` when the command completed but reported failures.
fn run_command(cli: Cli, config: KeepsetConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let format = cli.format;
    let mut out = io::stdout().lock();
    let store = Arc::new(open_store(&config)?);

    match cli.command {
        Commands::Types { action } => {
            match action {
                TypesAction::List => cli::cmd_types_list(&store, format, &mut out)?,
                TypesAction::Add { name, parent } => cli::cmd_types_add(
                    &store,
                    &TypeName::new(name),
                    &TypeName::new(parent),
                    &mut out,
                )?,
            }
            Ok(true)
        },

        Commands::Config => Ok(cli::cmd_config(&config, &store.schema(), format, &mut out)?),

        command => {
            let base = config.base_type.clone();
            let pruner = Arc::new(RetentionPruner::new(store, config));
            run_prune_command(command, &pruner, base, format, &mut out)
        },
    }
}

/// Runs a command that needs a pruner.
fn run_prune_command<W: io::Write>(
    command: Commands,
    pruner: &Arc<RetentionPruner<SqliteVersionStore>>,
    base: TypeName,
    format: OutputFormat,
    out: &mut W,
) -> Result<bool, Box<dyn std::error::Error>> {
    let to_types = |names: Vec<String>| names.into_iter().map(TypeName::new).collect::<Vec<_>>();

    let ok = match command {
        Commands::Prune { types, dry_run } => {
            cli::cmd_prune(pruner, &to_types(types), dry_run, format, out)?
        },
        Commands::Reset { types, dry_run } => {
            cli::cmd_reset(pruner, &to_types(types), dry_run, format, out)?
        },
        Commands::Record { id, dry_run } => {
            cli::cmd_record(pruner, RecordId::new(id), dry_run, format, out)?;
            true
        },
        Commands::Orphans { type_name, dry_run } => {
            let type_name = type_name.map_or(base, TypeName::new);
            cli::cmd_orphans(pruner, &type_name, dry_run, format, out)?
        },
        Commands::Archived {
            type_name,
            older_than_days,
            limit,
            dry_run,
        } => {
            let mut options = ArchivePurgeOptions::new(type_name.map_or(base, TypeName::new))
                .with_limit(limit)
                .with_dry_run(dry_run);
            if let Some(days) = older_than_days {
                options = options.with_older_than_days(days);
            }
            cli::cmd_archived(pruner, &options, format, out)?
        },
        Commands::Hook { event } => {
            let event: HookEvent = event.parse()?;
            cli::cmd_hook(Arc::clone(pruner), event, &read_hook_input()?, out)?;
            true
        },
        Commands::Types { .. } | Commands::Config => true,
    };
    Ok(ok)
}

/// Loads configuration.
fn load_config(cli: &Cli) -> Result<KeepsetConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => KeepsetConfig::load_from_file(path)?,
        None => KeepsetConfig::load_default()?,
    };
    let config = config.with_env_overrides();
    Ok(match &cli.database {
        Some(database) => config.with_database(database.clone()),
        None => config,
    })
}

/// Opens the version store, creating the database directory if needed.
fn open_store(config: &KeepsetConfig) -> Result<SqliteVersionStore, Box<dyn std::error::Error>> {
    if let Some(parent) = config.database.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(SqliteVersionStore::open(&config.database, &config.base_type)?)
}

/// Reads hook input from stdin as a string.
fn read_hook_input() -> Result<String, Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    if input.trim().is_empty() {
        Ok("{}".to_string())
    } else {
        Ok(input)
    }
}
