//! quakefuse-engine - Seismic event association and arbitration service
//!
//! Reads newline-delimited JSON notifier messages on stdin, groups the
//! delivered origins/magnitudes/focal mechanisms into events, arbitrates
//! the preferred solutions and publishes change notifications as
//! newline-delimited JSON on stdout. State persists in a SQLite database.

use anyhow::Result;
use clap::Parser;
use quakefuse_common::config::EngineConfig;
use quakefuse_common::db::{init_database, SqliteStore};
use quakefuse_common::messaging::{NotifierMessage, StdioTransport};
use quakefuse_engine::Engine;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "quakefuse-engine", version, about)]
struct Args {
    /// Configuration file (TOML); falls back to $QUAKEFUSE_CONFIG,
    /// then ./quakefuse.toml, then compiled defaults
    #[arg(short, long, env = "QUAKEFUSE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configured one
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting QuakeFuse engine v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();
    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.db_path = Some(db);
    }

    let db_path = config
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("quakefuse.db"));
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path).await?;
    let store = SqliteStore::new(pool);

    let (tx, rx) = mpsc::channel::<NotifierMessage>(64);

    // stdin reader: one JSON message per line, delivered in order
    let reader = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<NotifierMessage>(&line) {
                Ok(message) => {
                    if tx.blocking_send(message).is_err() {
                        break; // engine stopped
                    }
                }
                Err(e) => warn!("malformed message dropped: {}", e),
            }
        }
    });

    let mut engine = Engine::new(config, store, StdioTransport::new());
    engine.run(rx).await?;
    reader.await?;

    Ok(())
}
