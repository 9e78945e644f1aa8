//! `oracled run` subcommand implementation.
//!
//! Starts an oracle node with configuration layering:
//! 1. TOML config file (base)
//! 2. Environment variables (override)
//! 3. CLI arguments (highest priority)

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;

use crate::config::OracleConfig;
use crate::ledger::{LedgerReading, LedgerTransport, RpcLedgerClient};
use crate::node::OracleNode;
use crate::util::logging::{self, LogConfig};
use oracle_core::OracleError;

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(short, long, default_value = "oracle.toml")]
    pub config: PathBuf,

    #[arg(long, env = "ORACLE_NODE_ID")]
    pub node_id: Option<String>,

    #[arg(long, env = "ORACLE_ROUTER_BIND")]
    pub router_bind: Option<String>,

    #[arg(long, env = "ORACLE_PUBLISHER_BIND")]
    pub publisher_bind: Option<String>,

    #[arg(long, default_value = "./logs")]
    pub log_dir: PathBuf,

    #[arg(long, default_value = "10")]
    pub log_max_size_mb: u64,

    #[arg(long, default_value = "5")]
    pub log_max_files: usize,
}

/// Stands in for a real chain client when no `ledger.rpc` endpoint is
/// configured: accepts every submission immediately and logs it instead of
/// talking to a contract. The wire format for an actual RPC transport is
/// out of scope here; swap this out for a real [`LedgerTransport`] impl to
/// point at a live chain.
struct LoggingLedgerTransport;

#[async_trait::async_trait]
impl LedgerTransport for LoggingLedgerTransport {
    async fn send_transaction(&self, sensor_id: &str, value_q: i64, ts: u64, gas: u64) -> Result<String, OracleError> {
        tracing::info!(sensor_id, value_q, ts, gas, "ledger transaction (logging transport, not broadcast)");
        Ok(format!("local-tx-{sensor_id}-{ts}"))
    }

    async fn estimate_gas(&self, _sensor_id: &str, item_count: usize) -> Result<u64, OracleError> {
        Ok(21_000 * item_count.max(1) as u64)
    }

    async fn wait_for_confirmation(&self, _tx_ref: &str) -> Result<bool, OracleError> {
        Ok(true)
    }

    async fn read_latest(&self, sensor_id: &str) -> Result<LedgerReading, OracleError> {
        Err(OracleError::network(format!("no ledger endpoint configured, cannot read {sensor_id}")))
    }

    async fn latest_block(&self) -> Result<u64, OracleError> {
        Ok(0)
    }
}

pub async fn execute(args: Args) -> anyhow::Result<()> {
    let mut config = if args.config.exists() {
        OracleConfig::from_file(&args.config)?
    } else {
        tracing::warn!(path = %args.config.display(), "config file not found, using defaults");
        OracleConfig::default()
    };

    if let Some(id) = args.node_id {
        config.node.id = Some(id);
    }
    if let Some(router) = args.router_bind {
        config.node.router_bind = router;
    }
    if let Some(publisher) = args.publisher_bind {
        config.node.publisher_bind = publisher;
    }

    config.validate()?;

    logging::init_logging(&LogConfig {
        log_dir: args.log_dir,
        max_size_mb: args.log_max_size_mb,
        max_files: args.log_max_files,
        level: config.logging.level.clone(),
    })?;

    tracing::info!(
        node_id = ?config.node.id,
        router = %config.node.router_bind,
        publisher = %config.node.publisher_bind,
        peers = config.peers.peer_nodes.len(),
        sensors = config.sensors.len(),
        "starting oracle node"
    );

    let ledger = Arc::new(RpcLedgerClient::new(LoggingLedgerTransport, config.ledger.clone()));
    let node = Arc::new(OracleNode::new(config, ledger)?);
    node.start().await?;

    tracing::info!(id = %node.id(), "node started, waiting for shutdown signal");

    signal::ctrl_c().await?;

    tracing::info!("shutdown signal received");
    node.stop().await;

    Ok(())
}
