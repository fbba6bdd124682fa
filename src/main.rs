//! Healthcheck Storage CLI
//!
//! ## Usage
//!
//! ```bash
//! # Hierarchy levels
//! healthcheck-storage levels list
//! healthcheck-storage levels create --name "Team Lead" --permission view_trends
//! healthcheck-storage levels move --id <ID> --position 2
//! healthcheck-storage levels delete --id <ID>
//!
//! # Survey data
//! healthcheck-storage import fixture.json
//! healthcheck-storage complete-session --id s1
//!
//! # Trends
//! healthcheck-storage trend team --id t1
//! healthcheck-storage trend manager --id boss --zero-fill
//!
//! # Custom storage directory / config
//! healthcheck-storage --storage-dir /data/health stats
//! ```
//!
//! Results are printed as pretty JSON on stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use healthcheck_storage::db::SurveyFixture;
use healthcheck_storage::services::spawn_logging_listener;
use healthcheck_storage::{CancelToken, Config, CreateLevelInput, HealthDb, Services};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "healthcheck-storage")]
#[command(about = "Hierarchy ordering and trend pivots for team health checks")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "HEALTHCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "HEALTHCHECK_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage hierarchy levels
    #[command(subcommand)]
    Levels(LevelsCommand),

    /// Build a trend pivot
    #[command(subcommand)]
    Trend(TrendCommand),

    /// Import users, teams, sessions and responses from a JSON file
    Import { path: PathBuf },

    /// Mark a session completed
    CompleteSession {
        #[arg(long)]
        id: String,
    },

    /// Print row counts
    Stats,
}

#[derive(Subcommand, Debug)]
enum LevelsCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    Move {
        #[arg(long)]
        id: String,
        #[arg(long)]
        position: i64,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum TrendCommand {
    Team {
        #[arg(long)]
        id: String,
        /// Report missing cells as 0 instead of null
        #[arg(long)]
        zero_fill: bool,
    },
    Manager {
        #[arg(long)]
        id: String,
        #[arg(long)]
        zero_fill: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command, services: &Services, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Levels(LevelsCommand::List) => print_json(&services.hierarchy.list()?),
        Command::Levels(LevelsCommand::Create { name, id, permissions }) => {
            let level = services.hierarchy.create(CreateLevelInput { id, name, permissions })?;
            print_json(&level)
        }
        Command::Levels(LevelsCommand::Move { id, position }) => {
            print_json(&services.hierarchy.move_level(&id, position)?)
        }
        Command::Levels(LevelsCommand::Delete { id }) => print_json(&services.hierarchy.delete(&id)?),
        Command::Trend(trend) => {
            let cancel = CancelToken::new();
            let (result, zero_fill) = match trend {
                TrendCommand::Team { id, zero_fill } => (services.trends.build_for_team(&id, &cancel)?, zero_fill),
                TrendCommand::Manager { id, zero_fill } => {
                    (services.trends.build_for_manager(&id, &cancel)?, zero_fill)
                }
            };
            if zero_fill || config.trend_zero_fill {
                print_json(&result.zero_filled())
            } else {
                print_json(&result)
            }
        }
        Command::Import { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let fixture: SurveyFixture = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            print_json(&services.surveys.import(&fixture)?)
        }
        Command::CompleteSession { id } => {
            services.surveys.complete_session(&id)?;
            print_json(&serde_json::json!({ "completed": id }))
        }
        Command::Stats => print_json(&services.db.stats()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("healthcheck_storage=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
    } else {
        Config::default()
    };

    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    std::fs::create_dir_all(&config.storage_dir)?;

    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(HealthDb::open(&config.db_path(), config.busy_timeout())?);

    let services = Services::new(db, &config);
    let listener = spawn_logging_listener(services.events.clone());

    let command = args.command;
    let outcome = tokio::task::spawn_blocking(move || run(command, &services, &config)).await?;

    // services dropped with the blocking task; the listener drains and exits
    let _ = listener.await;
    outcome
}
