use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_min_nodes")]
    pub min_nodes: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_outlier_tolerance")]
    pub outlier_tolerance: f64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_absolute_floor")]
    pub absolute_floor: f64,
}

fn default_min_nodes() -> usize {
    3
}

fn default_threshold() -> f64 {
    0.8
}

fn default_outlier_tolerance() -> f64 {
    0.05
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_absolute_floor() -> f64 {
    0.1
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_nodes == 0 {
            return Err(ConfigError::Validation("consensus.min_nodes must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Validation(
                "consensus.threshold must be in [0, 1]".into(),
            ));
        }
        if self.outlier_tolerance < 0.0 {
            return Err(ConfigError::Validation(
                "consensus.outlier_tolerance must be >= 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "consensus.timeout_seconds must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_nodes: default_min_nodes(),
            threshold: default_threshold(),
            outlier_tolerance: default_outlier_tolerance(),
            timeout_seconds: default_timeout_seconds(),
            absolute_floor: default_absolute_floor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert!(ConsensusConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = ConsensusConfig { threshold: 1.5, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_min_nodes_rejected() {
        let config = ConsensusConfig { min_nodes: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
