//! Querystash CLI - drive the query archive against a local data directory

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use querystash::command::{self, Command as ArchiveCommand};
use querystash::config;
use querystash::store::FileByteStore;
use querystash::summarize::NoSummarizer;
use querystash::{ByteStore, CapturedQuery, QueryArchive};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "querystash")]
#[command(version = "0.1.0")]
#[command(about = "Local archive for captured database queries")]
#[command(long_about = r#"
Querystash keeps captured database queries in an embedded SQLite database
that is persisted as a byte buffer, with versioned schema migrations and
rolling backups.

Example usage:
  querystash save capture.json
  querystash recent --limit 20
  querystash search "Events"
  querystash export stash.sqlite
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory holding the database buffer and backups
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show lifecycle and migration status
    Status,

    /// Count archived queries
    Count,

    /// List the most recently used queries
    Recent {
        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// How many results to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },

    /// Search archived queries by text, database, cluster, or URL
    Search {
        /// Search term
        term: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Archive a capture described by a JSON file
    Save {
        /// Path to a JSON file with the captured query
        file: PathBuf,
    },

    /// Delete a query by id
    Delete {
        /// Query id
        id: i64,
    },

    /// Update the description of a query
    Describe {
        /// Query id
        id: i64,

        /// New description
        description: String,
    },

    /// Export the database buffer to a file
    Export {
        /// Output file
        output: PathBuf,
    },

    /// Import a database buffer from a file
    Import {
        /// Input file (SQLite database export)
        input: PathBuf,
    },

    /// List backup snapshots
    Backups,

    /// Export one backup snapshot to a file
    ExportBackup {
        /// Backup key, as shown by `backups`
        key: String,

        /// Output file
        output: PathBuf,
    },

    /// Write a default querystash.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let path = config::default_config_path();
        let config = config::QuerystashConfig {
            data_dir: Some(config::default_data_dir().display().to_string()),
        };
        config::write_config(&path, &config, force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = config::load_config(None)?;
    let data_dir = config::resolve_data_dir(cli.data_dir, config.as_ref());
    let mut archive = open_archive(&data_dir).await?;

    match cli.command {
        Commands::Status => {
            print_response(command::dispatch(&mut archive, ArchiveCommand::GetStatus).await)?;
        }

        Commands::Count => {
            print_response(command::dispatch(&mut archive, ArchiveCommand::GetCount).await)?;
        }

        Commands::Recent { limit, offset } => {
            let response = command::dispatch(
                &mut archive,
                ArchiveCommand::GetRecent { limit: Some(limit), offset: Some(offset) },
            )
            .await;
            print_response(response)?;
        }

        Commands::Search { term, limit } => {
            let response = command::dispatch(
                &mut archive,
                ArchiveCommand::Search { term, limit: Some(limit) },
            )
            .await;
            print_response(response)?;
        }

        Commands::Save { file } => {
            let contents = std::fs::read_to_string(&file)?;
            let data: CapturedQuery = serde_json::from_str(&contents)?;
            let response =
                command::dispatch(&mut archive, ArchiveCommand::SaveQuery { data }).await;
            match (&response.success, &response.error) {
                (true, _) => println!("Capture archived"),
                (false, None) => println!("Capture skipped by archive filters"),
                (false, Some(e)) => anyhow::bail!("save failed: {}", e),
            }
        }

        Commands::Delete { id } => {
            let response = command::dispatch(&mut archive, ArchiveCommand::Delete { id }).await;
            if response.success {
                println!("Deleted query {}", id);
            } else {
                anyhow::bail!(
                    "delete failed: {}",
                    response.error.unwrap_or_else(|| "query not found".to_string())
                );
            }
        }

        Commands::Describe { id, description } => {
            let response = command::dispatch(
                &mut archive,
                ArchiveCommand::UpdateDescription { id, description },
            )
            .await;
            if response.success {
                println!("Updated description for query {}", id);
            } else {
                anyhow::bail!(
                    "update failed: {}",
                    response.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
        }

        Commands::Export { output } => {
            let bytes = archive.export()?;
            std::fs::write(&output, &bytes)?;
            println!("Exported {} bytes to {}", bytes.len(), output.display());
        }

        Commands::Import { input } => {
            let bytes = std::fs::read(&input)?;
            archive.import(&bytes).await?;
            println!("Imported {} bytes from {}", bytes.len(), input.display());
        }

        Commands::Backups => {
            print_response(command::dispatch(&mut archive, ArchiveCommand::ListBackups).await)?;
        }

        Commands::ExportBackup { key, output } => {
            let bytes = archive.backups().export(&key).await?;
            std::fs::write(&output, &bytes)?;
            println!("Exported backup {} to {}", key, output.display());
        }

        Commands::Init { .. } => unreachable!("handled before archive setup"),
    }

    Ok(())
}

/// Open the archive over a directory-backed byte store. Initialization
/// failures are logged, not fatal: commands report unavailability themselves
/// and `status` still shows the failed state.
async fn open_archive(data_dir: &Path) -> anyhow::Result<QueryArchive> {
    let store: Arc<dyn ByteStore> = Arc::new(FileByteStore::open(data_dir)?);
    let mut archive = QueryArchive::new(store, Arc::new(NoSummarizer));
    if let Err(e) = archive.init().await {
        tracing::error!("Archive initialization failed: {}", e);
    }
    Ok(archive)
}

fn print_response(response: command::Response) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
