//! `triggerd` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server with a background trigger pump over
//!                in-memory backends (development/testing).
//! - `validate` — validate a functions file (definitions + triggers).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use capabilities::memory::{
    InMemoryBlobStore, InMemoryLedger, InMemoryMessageSource, InMemoryRegistry, RecordingSink,
};
use capabilities::{FunctionDefinition, MessageSource};
use dispatch::{Dispatcher, InMemoryStatusTracker};
use engine::{TriggerPump, TriggerRaw, TriggerSubscription};

#[derive(Parser)]
#[command(
    name = "triggerd",
    about = "Trigger evaluation and execution dispatch service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server with a background trigger pump.
    Serve {
        #[arg(long, env = "TRIGGERD_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
        /// Path to the functions file (JSON list of function + trigger).
        #[arg(long, env = "TRIGGERD_FUNCTIONS")]
        functions: PathBuf,
        /// Seconds between trigger evaluation passes.
        #[arg(long, default_value_t = 10)]
        poll_interval_secs: u64,
    },
    /// Validate a functions file without starting anything.
    Validate {
        /// Path to the functions file.
        path: PathBuf,
    },
}

/// One entry of the functions file: a function definition plus the trigger
/// that fires it.
#[derive(Debug, Deserialize)]
struct FunctionEntry {
    function: FunctionDefinition,
    trigger: TriggerRaw,
}

fn load_entries(path: &PathBuf) -> anyhow::Result<Vec<FunctionEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read functions file {}", path.display()))?;
    serde_json::from_str(&content).context("functions file is not valid JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            functions,
            poll_interval_secs,
        } => {
            let entries = load_entries(&functions)?;

            let registry = Arc::new(InMemoryRegistry::new());
            let blob_store = Arc::new(InMemoryBlobStore::new());
            let ledger = Arc::new(InMemoryLedger::new());
            let tracker = Arc::new(InMemoryStatusTracker::new());
            let sink = Arc::new(RecordingSink::new());

            let mut sources: HashMap<String, Arc<dyn MessageSource>> = HashMap::new();
            let mut subscriptions = Vec::with_capacity(entries.len());
            for entry in entries {
                let trigger = entry
                    .trigger
                    .validate()
                    .with_context(|| format!("invalid trigger for '{}'", entry.function.id))?;
                if let Some(entity) = trigger.entity() {
                    sources
                        .entry(entity.to_owned())
                        .or_insert_with(|| Arc::new(InMemoryMessageSource::new()));
                }
                subscriptions.push(TriggerSubscription {
                    function_id: entry.function.id.clone(),
                    trigger,
                });
                registry.register(entry.function);
            }

            let dispatcher = Arc::new(Dispatcher::new(tracker.clone(), sink));
            let pump = Arc::new(TriggerPump::new(
                blob_store,
                sources,
                ledger,
                registry.clone(),
                dispatcher.clone(),
            ));

            let subscriptions = Arc::new(subscriptions);
            info!(
                subscriptions = subscriptions.len(),
                "starting trigger pump (every {poll_interval_secs}s)"
            );
            {
                let pump = pump.clone();
                let subscriptions = subscriptions.clone();
                tokio::spawn(async move {
                    let mut ticker =
                        tokio::time::interval(Duration::from_secs(poll_interval_secs));
                    loop {
                        ticker.tick().await;
                        pump.run_pass(&subscriptions).await;
                    }
                });
            }

            let state = api::AppState {
                dispatcher,
                tracker,
                registry,
                pump,
                subscriptions,
            };
            api::serve(&bind, state).await.context("server failed")?;
        }

        Command::Validate { path } => {
            let entries = load_entries(&path)?;
            let mut failures = 0usize;
            for entry in &entries {
                match entry.trigger.validate() {
                    Ok(trigger) => {
                        println!("✅ {}: {:?} trigger ok", entry.function.id, trigger.kind());
                    }
                    Err(e) => {
                        eprintln!("❌ {}: {e}", entry.function.id);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                eprintln!("{failures} of {} entries invalid", entries.len());
                std::process::exit(1);
            }
            println!("All {} entries valid.", entries.len());
        }
    }

    Ok(())
}
