mod consensus;
mod sensors;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use consensus::ConsensusConfig;
pub use sensors::{AdapterKind, SensorConfig, SensorsConfig, TemperatureUnit};
pub use crate::util::logging::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub node: NodeConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub peers: PeerConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: Option<String>,
    #[serde(default = "default_min_stake")]
    pub min_stake: u64,
    /// This node's starting stake, as tracked locally by the stake gate.
    /// Defaults to `min_stake` (start exactly at the floor) when unset;
    /// the ledger's `update_stake` keeps it current from there.
    #[serde(default)]
    pub initial_stake: Option<u64>,
    #[serde(default = "default_router_bind")]
    pub router_bind: String,
    #[serde(default = "default_publisher_bind")]
    pub publisher_bind: String,
}

fn default_min_stake() -> u64 {
    1_000
}

fn default_router_bind() -> String {
    "tcp://0.0.0.0:30001".into()
}

fn default_publisher_bind() -> String {
    "tcp://0.0.0.0:31001".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub rpc: String,
    #[serde(default)]
    pub chain_id: u64,
    #[serde(default)]
    pub contract: String,
    #[serde(default = "default_scale")]
    pub scale: u64,
    #[serde(default = "default_gas_default")]
    pub gas_default: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_submit_queue_capacity")]
    pub submit_queue_capacity: usize,
}

fn default_scale() -> u64 {
    100
}

fn default_gas_default() -> u64 {
    21_000
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_confirm_timeout() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_submit_queue_capacity() -> usize {
    128
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc: String::new(),
            chain_id: 0,
            contract: String::new(),
            scale: default_scale(),
            gas_default: default_gas_default(),
            cache_ttl_secs: default_cache_ttl(),
            confirm_timeout_secs: default_confirm_timeout(),
            retry_attempts: default_retry_attempts(),
            submit_queue_capacity: default_submit_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "default_reputation")]
    pub default: f64,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    #[serde(default = "default_event_retention_days")]
    pub event_retention_days: u64,
}

fn default_reputation() -> f64 {
    0.8
}

fn default_decay_rate() -> f64 {
    0.001
}

fn default_event_retention_days() -> u64 {
    30
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            default: default_reputation(),
            decay_rate: default_decay_rate(),
            event_retention_days: default_event_retention_days(),
        }
    }
}

/// One statically-configured federation member: the stake-gated
/// consensus model requires a peer's public key in advance so its
/// signed window contributions can be verified, so `peer_nodes[]`
/// carries a full descriptor rather than a bare address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerNodeConfig {
    pub id: String,
    pub public_key: String,
    pub router_address: String,
    #[serde(default)]
    pub publisher_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerConfig {
    #[serde(default)]
    pub peer_nodes: Vec<PeerNodeConfig>,
}

impl OracleConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.consensus.validate()?;
        sensors::validate_sensors(&self.sensors)?;
        if self.node.min_stake == 0 {
            return Err(ConfigError::Validation("node.min_stake must be >= 1".into()));
        }
        Ok(())
    }

    pub fn minimal() -> Self {
        Self {
            node: NodeConfig {
                id: None,
                min_stake: default_min_stake(),
                initial_stake: None,
                router_bind: default_router_bind(),
                publisher_bind: default_publisher_bind(),
            },
            consensus: ConsensusConfig::default(),
            ledger: LedgerConfig::default(),
            reputation: ReputationConfig::default(),
            sensors: SensorsConfig::default(),
            peers: PeerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::minimal()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for oracle_core::OracleError {
    fn from(err: ConfigError) -> Self {
        oracle_core::OracleError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = OracleConfig::minimal();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [node]
            min_stake = 5000
            router_bind = "tcp://0.0.0.0:30001"
            publisher_bind = "tcp://0.0.0.0:31001"

            [consensus]
            min_nodes = 4
            threshold = 0.75

            [sensors.roof-temp]
            adapter = "temperature"
            polling_interval_secs = 15

            [[peers.peer_nodes]]
            id = "node-b"
            public_key = "02aa"
            router_address = "tcp://192.168.1.10:30001"
        "#;

        let config = OracleConfig::from_toml(toml).unwrap();
        assert_eq!(config.consensus.min_nodes, 4);
        assert_eq!(config.peers.peer_nodes.len(), 1);
        assert_eq!(config.sensors.len(), 1);
    }

    #[test]
    fn test_zero_min_stake_rejected() {
        let mut config = OracleConfig::minimal();
        config.node.min_stake = 0;
        assert!(config.validate().is_err());
    }
}
