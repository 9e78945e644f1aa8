//! # oracle
//!
//! Oracle gateway node for decentralized IoT sensor consensus: polls local
//! sensors on a fixed interval, exchanges signed readings with a
//! statically-configured set of peer nodes, aggregates them into a single
//! consensus result per window, gates and slashes peer stake through a
//! reputation table, and submits the result to a ledger client.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oracle::config::OracleConfig;
//! use oracle::ledger::RpcLedgerClient;
//! use oracle::node::OracleNode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OracleConfig::from_file("oracle.toml")?;
//!     let ledger = std::sync::Arc::new(RpcLedgerClient::new(config.ledger.clone(), my_transport));
//!     let node = OracleNode::new(config, ledger)?;
//!     node.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli`: enables the `oracled` binary, file-rotated logging, and key
//!   generation tooling.

pub mod adapter;
pub mod aggregator;
pub mod collector;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod metrics;
pub mod network;
pub mod node;
pub mod reputation;
pub mod scheduler;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use oracle_core::OracleError;

pub mod prelude {
    pub use crate::config::OracleConfig;
    pub use crate::node::OracleNode;
    pub use oracle_core::reading::Reading;
    pub use oracle_core::OracleError;
}
