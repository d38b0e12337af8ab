//! Election Node
//!
//! Hosts the election ledger behind a JSON-RPC endpoint, or runs a single
//! contract invocation against the on-disk ledger.
//! State is persisted to disk and survives restarts.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use rpc_server::{HttpRpcServer, RpcContext, RpcServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vote_program::Response;

mod config;
mod storage;

use config::NodeConfig;
use storage::{save_snapshot, NodeLedger};

/// Election ledger node
#[derive(Parser, Debug)]
#[command(name = "election-node")]
#[command(about = "Election ledger with a JSON-RPC front end", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// HTTP RPC bind address
    #[arg(long, global = true)]
    rpc_addr: Option<String>,

    /// Data directory for persistent state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Save state every N commits (0 = only on shutdown)
    #[arg(long, global = true)]
    save_interval: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the ledger over JSON-RPC (default)
    Serve,
    /// Run one contract function and print its response
    Invoke {
        /// Function name, e.g. castVote
        function: String,
        /// String arguments
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { args.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    }
    .with_overrides(args.rpc_addr.clone(), args.data_dir.clone(), args.save_interval);

    match args.command {
        Some(Command::Invoke { function, args }) => run_invoke(&config, &function, &args),
        Some(Command::Serve) | None => {
            let rpc_config = RpcServerConfig {
                http_addr: config.rpc_addr.clone(),
                verbose: args.verbose,
            };
            run_server(config, rpc_config).await
        }
    }
}

/// One invocation against the on-disk ledger
fn run_invoke(config: &NodeConfig, function: &str, args: &[String]) -> Result<()> {
    let ledger = NodeLedger::open(&config.data_dir, config.seed_on_empty)?;

    let result = ledger.processor.invoke(function, args);
    if result.committed() {
        ledger.save()?;
    }

    match result.response() {
        Response::Success(payload) => {
            println!("{}", String::from_utf8_lossy(&payload));
            Ok(())
        }
        Response::Error(message) => anyhow::bail!("{}", message),
    }
}

/// Serve JSON-RPC until Ctrl+C
async fn run_server(config: NodeConfig, rpc_config: RpcServerConfig) -> Result<()> {
    tracing::info!("Starting election node");
    tracing::info!("  HTTP RPC: {}", rpc_config.http_addr);
    tracing::info!("  Data directory: {:?}", config.data_dir);
    tracing::info!("  Save interval: {} commits", config.save_interval);

    let ledger = NodeLedger::open(&config.data_dir, config.seed_on_empty)?;
    let mut commits = ledger.processor.subscribe();

    // Spawn commit handler
    let persist_store = ledger.persistent.clone();
    let persist_processor = ledger.processor.clone();
    let save_interval = config.save_interval;
    let verbose = rpc_config.verbose;
    let update_handler = tokio::spawn(async move {
        loop {
            let update = match commits.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Commit handler lagged by {} updates", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if verbose {
                let keys: Vec<&str> = update.writes.iter().map(|(k, _)| k.as_str()).collect();
                tracing::debug!(
                    "Commit {} ({}): {:?}",
                    update.revision,
                    update.function,
                    keys
                );
            }

            // Periodic save to disk, off the async workers
            if save_interval > 0 && update.revision % save_interval == 0 {
                let processor = persist_processor.clone();
                let persistent = persist_store.clone();
                let saved =
                    tokio::task::spawn_blocking(move || save_snapshot(&processor, &persistent))
                        .await;
                match saved {
                    Ok(Ok(_)) => tracing::info!("Saved state at revision {}", update.revision),
                    Ok(Err(e)) => tracing::error!("Failed to save state: {}", e),
                    Err(e) => tracing::error!("Save task failed: {}", e),
                }
            }
        }
    });

    let rpc_context = Arc::new(RpcContext {
        processor: ledger.processor.clone(),
    });

    tracing::info!("Election node running. Press Ctrl+C to stop.");

    let server = HttpRpcServer::new(rpc_context);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    if let Err(e) = server.run(&rpc_config.http_addr, shutdown).await {
        tracing::error!("HTTP RPC server error: {}", e);
    }

    tracing::info!("Shutting down...");
    update_handler.abort();

    // Save state before shutdown
    let final_revision = ledger.processor.current_revision();
    tracing::info!("Saving final state at revision {}...", final_revision);
    match tokio::task::spawn_blocking(move || ledger.save()).await? {
        Ok(count) => tracing::info!(
            "Final state saved: {} entries at revision {}",
            count,
            final_revision
        ),
        Err(e) => tracing::error!("Failed to save final state: {}", e),
    }

    tracing::info!("Election node stopped");

    Ok(())
}
