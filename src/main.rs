// ABOUTME: Entry point for the worldlog binary.
// ABOUTME: Parses CLI arguments, loads config, and runs the log/count/query commands.

mod config;
mod pager;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use worldlog_core::actions::{self, ActionRegistry};
use worldlog_core::entry::Tags;
use worldlog_engine::ActionLogger;
use worldlog_store::Database;

use crate::config::WorldlogConfig;

#[derive(Parser)]
#[command(name = "worldlog", about = "Append-only world action log with radius-bounded queries")]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, default_value = "worldlog.sqlite")]
    db: PathBuf,

    /// Path to the YAML config file.
    #[arg(long, default_value = "worldlog.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one world action at a location, with optional tags.
    Log {
        world: String,
        x: i64,
        y: i64,
        z: i64,
        action: String,
        /// Tag in name=value form; may be repeated.
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Count logged actions within a radius of a point.
    Count {
        world: String,
        x: i64,
        y: i64,
        z: i64,
        radius: f64,
        /// Restrict to one action kind.
        #[arg(long)]
        action: Option<String>,
    },

    /// View one page of logged actions within a radius of a point.
    Query {
        world: String,
        x: i64,
        y: i64,
        z: i64,
        radius: f64,
        /// Restrict to one action kind.
        #[arg(long)]
        action: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("tag must be name=value, got '{s}'"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worldlog=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let config = match WorldlogConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load config {}: {}", cli.config.display(), e);
            std::process::exit(2);
        }
    };
    let registry = ActionRegistry::build(&config.enabled_actions);

    let (db, shutdown) = match Database::open(&cli.db) {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!("failed to open database {}: {}", cli.db.display(), e);
            std::process::exit(2);
        }
    };

    // A fatal storage fault freezes the in-flight operation; this watcher
    // turns the signal into an orderly process exit.
    tokio::spawn(async move {
        shutdown.triggered().await;
        tracing::error!("shutting down after fatal storage fault");
        std::process::exit(1);
    });

    let logger = ActionLogger::new(db, config.formatter_table());

    match cli.command {
        Command::Log { world, x, y, z, action, tags } => {
            if action.starts_with(actions::NAMESPACE) && !registry.is_enabled(&action) {
                tracing::warn!("built-in action '{action}' is not enabled in the config; nothing logged");
            } else {
                let timestamp = chrono::Utc::now().timestamp();
                let tags: Tags = tags.into_iter().collect();
                let id = logger.log(&world, x, y, z, &action, timestamp, &tags).await;
                println!("logged entry #{id}");
            }
        }

        Command::Count { world, x, y, z, radius, action } => {
            let count = logger
                .get_around_count(&world, x, y, z, radius, action.as_deref())
                .await;
            println!("{count}");
        }

        Command::Query { world, x, y, z, radius, action, page } => {
            let result = pager::fetch_page(
                &logger,
                &world,
                x,
                y,
                z,
                radius,
                action.as_deref(),
                page,
                config.entries_per_page,
            )
            .await;

            if result.entries.is_empty() {
                println!("No logs found around this area.");
            } else {
                println!("Logs ({} / {})", result.page, result.pages);
                for (i, entry) in result.entries.iter().enumerate() {
                    let time = chrono::DateTime::from_timestamp(entry.timestamp, 0)
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| entry.timestamp.to_string());
                    let detail =
                        logger.format(&entry.action, &entry.world, entry.x, entry.y, entry.z, &entry.tags);
                    println!(
                        "{}. (#{}) {} {} {}",
                        result.offset as usize + i + 1,
                        entry.id,
                        time,
                        entry.action,
                        detail
                    );
                }
            }
        }
    }

    logger.close().await;
}
