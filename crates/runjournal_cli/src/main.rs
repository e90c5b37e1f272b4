//! Command line access to a running journal data directory.
//!
//! # Responsibility
//! - Open the journal (logging, store, projections) for one invocation.
//! - Print query results as JSON on stdout.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use runjournal_core::service::dashboard_service::DashboardOptions;
use runjournal_core::{init_logging, AppConfig, Journal};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runjournal")]
#[command(about = "Query a running journal stored as plain files")]
struct Cli {
    /// Journal data directory
    data_dir: PathBuf,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild every projection from the track and journal files
    Rebuild,
    /// Print the track folder tree
    Tree {
        /// Case-insensitive track name filter
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Print one track with its length and usages
    Track {
        /// Track ID
        id: String,
    },
    /// List journal entries referencing a track
    Usages {
        /// Track ID
        track_id: String,
    },
    /// List journal entries in [from, to)
    Journal {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Summarize runs in [from, to)
    Dashboard {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Number of top tracks to show
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Print core health and version
    Ping,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Ping = cli.command {
        print_json(&json!({
            "ping": runjournal_core::ping(),
            "version": runjournal_core::core_version(),
        }))?;
        return Ok(());
    }

    let data_dir = if cli.data_dir.is_absolute() {
        cli.data_dir
    } else {
        std::env::current_dir()
            .context("could not resolve current directory")?
            .join(cli.data_dir)
    };
    let mut config = AppConfig::new(data_dir);
    if let Some(level) = cli.log_level {
        config = config.with_log_level(level);
    }
    config.validate()?;
    init_logging(&config.log_level, &config.log_dir)?;

    let (mut journal, report) = Journal::open(config)?;
    info!(
        "event=cli_start module=cli status=ok rebuilt={}",
        report.rebuilt_count()
    );

    match cli.command {
        Commands::Rebuild => {
            journal.rebuild()?;
            print_json(&json!({ "rebuilt": true }))?;
        }
        Commands::Tree { filter } => {
            let tree = journal.track_tree_service().tree(filter.as_deref());
            print_json(&tree)?;
        }
        Commands::Track { id } => {
            let details = journal.track_editor_service().get_track(&id)?;
            print_json(&details)?;
        }
        Commands::Usages { track_id } => {
            let usages = journal.engine().track_usages().get_usages(&track_id);
            print_json(&usages)?;
        }
        Commands::Journal { from, to } => {
            let items = journal.journal_list_service().list_between(from, to)?;
            print_json(&items)?;
        }
        Commands::Dashboard { from, to, top } => {
            let dashboard = journal.dashboard_service().load(DashboardOptions {
                from,
                to,
                top_tracks: top,
            })?;
            print_json(&dashboard)?;
        }
        Commands::Ping => {}
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
