use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use repscan::config::Config;
use repscan::core::pipeline::{LedgerCommand, PipelineOutput, run_pipeline};
use repscan::db::SharedDatabase;
use repscan::rewards::ledger::RewardLedger;

fn main() {
    // Initialize logging (stdout carries results, so logs go to stderr)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                "repscan=info"
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();

    tracing::info!("repscan starting...");

    let config = Config::load("repscan.toml");
    tracing::debug!("Config: {:?}", config);
    if let Err(e) = config.rules.validate() {
        tracing::error!("Invalid rule tables: {e}");
        std::process::exit(2);
    }

    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!("Failed to create database directory {}: {e}", parent.display());
            std::process::exit(1);
        }
    }
    let db = match SharedDatabase::open(db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to open reward database {}: {e}", config.database.path);
            std::process::exit(1);
        }
    };
    tracing::info!("Reward database opened at {}", config.database.path);

    let ledger = match RewardLedger::new(db, config.rules.clone()) {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            tracing::error!("Invalid rule tables: {e}");
            std::process::exit(2);
        }
    };

    // stdin → pipeline channel
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<LedgerCommand>();

    // pipeline → stdout channel
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<PipelineOutput>();

    // Read one JSON command per line on a plain thread; blocking stdin stays off the runtime.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for (line_no, line) in stdin.lock().lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerCommand>(&line) {
                Ok(command) => {
                    if cmd_tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Skipping line {}: {e}", line_no + 1),
            }
        }
        tracing::debug!("stdin closed");
    });

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    rt.block_on(async move {
        let pipeline = tokio::spawn(run_pipeline(cmd_rx, out_tx, ledger));
        while let Some(output) = out_rx.recv().await {
            match serde_json::to_string(&output) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!("Failed to encode output: {e}"),
            }
        }
        if let Err(e) = pipeline.await {
            tracing::error!("Pipeline task failed: {e}");
        }
    });

    tracing::info!("repscan stopped");
}
