//! fslinks CLI
//!
//! Command-line interface for fslinks - ordered, tagged links to files,
//! folders and network paths.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use fslinks_core::{Config, LinkStore, StoreError, StoreOptions};

mod commands;
mod output;
mod prompt;

use commands::link::{AddArgs, EditArgs, ListArgs};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "fslinks")]
#[command(about = "fslinks - Ordered, tagged links to files and folders")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database file to use instead of <data_dir>/links.db
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Open the database read-only
    #[arg(long, global = true)]
    read_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a link
    Add(AddArgs),
    /// List links (optionally filtered)
    #[command(alias = "ls")]
    List(ListArgs),
    /// Show link details
    Show {
        /// Link ID
        id: i64,
    },
    /// Change a link's name, path, tags or icon
    Edit(EditArgs),
    /// Delete a link
    #[command(alias = "rm")]
    Delete {
        /// Link ID
        id: i64,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Set the display order (every link ID, in order)
    Reorder {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Move a link to a new position
    Move {
        /// Link ID
        id: i64,
        /// Zero-based target position
        index: usize,
    },
    /// List all tags
    Tags,
    /// Import links from a JSON export
    Import {
        file: PathBuf,
    },
    /// Export all links to JSON
    Export {
        file: PathBuf,
    },
    /// Show database status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, busy_timeout_ms, default_tags, auto_tag, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output);

    if let Err(ref e) = result {
        if let Some(hint) = e
            .downcast_ref::<StoreError>()
            .and_then(StoreError::recovery_suggestion)
        {
            if !output.is_quiet() {
                eprintln!("Hint: {}", hint);
            }
        }
    }

    result
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    let mut store = open_store(&cli, &config)?;

    let result = match cli.command {
        Commands::Add(args) => commands::link::add(&mut store, &config, args, output),
        Commands::List(args) => commands::link::list(&store, &args, output),
        Commands::Show { id } => commands::link::show(&store, id, output),
        Commands::Edit(args) => commands::link::edit(&mut store, args, output),
        Commands::Delete { id, yes } => commands::link::delete(&mut store, id, yes, output),
        Commands::Reorder { ids } => commands::link::reorder(&mut store, ids, output),
        Commands::Move { id, index } => commands::link::move_link(&mut store, id, index, output),
        Commands::Tags => commands::tag::list(&store, output),
        Commands::Import { file } => commands::transfer::import(&mut store, &file, output),
        Commands::Export { file } => commands::transfer::export(&store, &file, output),
        Commands::Status => commands::status::show(&store, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    store.close();
    result
}

fn open_store(cli: &Cli, config: &Config) -> Result<LinkStore> {
    let mut options = StoreOptions::from_config(config).read_only(cli.read_only);
    if let Some(db) = &cli.db {
        options.path = Some(db.clone());
    }

    let path = options
        .path
        .clone()
        .unwrap_or_else(|| config.database_path());
    LinkStore::open(&options)
        .with_context(|| format!("Failed to open link database {}", path.display()))
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Only initializes if FSLINKS_LOG environment variable is set.
/// Logs to config.log_file when set, otherwise to stderr.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("FSLINKS_LOG") else {
        return;
    };

    let writer = match &config.log_file {
        Some(log_path) => match File::create(log_path) {
            Ok(f) => BoxMakeWriter::new(Mutex::new(f)),
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                return;
            }
        },
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let env_filter = EnvFilter::new(format!(
        "fslinks_core={},fslinks_cli={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .try_init();

    info!("Logging initialized");
}
