//! Operator CLI for the labmirror harvester.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mirror_cli::commands;
use mirror_cli::config::MirrorConfig;
use mirror_data::EntityKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labmirror")]
#[command(about = "Keeps a replica store consistent with a remote data source", long_about = None)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synchronization
    Sync {
        /// Compute and report, mutate nothing
        #[arg(long)]
        dry_run: bool,
        /// Reconcile from this RFC3339 timestamp instead of the stored one
        #[arg(long)]
        since: Option<String>,
        /// Only these kinds (comma-separated: project,experiment,sample,dataset)
        #[arg(long)]
        kinds: Option<String>,
    },
    /// Preview pending changes (sync --dry-run)
    Plan {
        /// Reconcile from this RFC3339 timestamp instead of the stored one
        #[arg(long)]
        since: Option<String>,
    },
    /// Config operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init,
    /// Print the effective config (credentials redacted)
    Show,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var("MIRROR_CONFIG").map(PathBuf::from).ok())
        .unwrap_or_else(|| {
            dirs::home_dir()
                .expect("could not determine home directory")
                .join(".labmirror")
                .join("config.toml")
        })
}

fn parse_since(value: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| anyhow::anyhow!("invalid --since {s}: {e}"))
        })
        .transpose()
}

fn parse_kinds(value: Option<String>) -> anyhow::Result<Option<Vec<EntityKind>>> {
    let Some(value) = value else { return Ok(None) };
    let mut kinds = Vec::new();
    for part in value.split(',') {
        let kind = match part.trim().to_ascii_lowercase().as_str() {
            "project" => EntityKind::Project,
            "experiment" => EntityKind::Experiment,
            "sample" => EntityKind::Sample,
            "dataset" | "data_set" => EntityKind::DataSet,
            other => anyhow::bail!("unknown kind: {other}"),
        };
        kinds.push(kind);
    }
    Ok(Some(kinds))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mirror_sync=info,warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = config_path(&cli);
    let state_path = config_path.with_file_name("state.toml");

    match cli.command {
        Commands::Sync {
            dry_run,
            since,
            kinds,
        } => {
            let config = MirrorConfig::load_or_create(&config_path)?;
            commands::sync::run(
                config,
                &state_path,
                commands::sync::SyncArgs {
                    dry_run,
                    since: parse_since(since)?,
                    kinds: parse_kinds(kinds)?,
                },
            )
            .await
        }
        Commands::Plan { since } => {
            let config = MirrorConfig::load_or_create(&config_path)?;
            commands::sync::run(
                config,
                &state_path,
                commands::sync::SyncArgs {
                    dry_run: true,
                    since: parse_since(since)?,
                    kinds: None,
                },
            )
            .await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init => commands::config::init(&config_path),
            ConfigCommands::Show => commands::config::show(&config_path),
        },
    }
}
