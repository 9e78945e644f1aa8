//! The stake gate half of C5: checks this node's own stake against the
//! configured minimum, and rolls the reputation table's state into the
//! security summary the metrics/health surface consumes.
//!
//! Grounded on `original_source/src/security/staking.py`
//! (`StakingManager.check_stake`, `get_security_metrics`,
//! `monitor_network_security`).

use std::sync::atomic::{AtomicU64, Ordering};

use oracle_core::OracleError;
use serde::{Deserialize, Serialize};

use super::ReputationTable;

/// Aggregate view of network security state, fed to the metrics bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityMetrics {
    pub total_staked: u64,
    pub avg_reputation: f64,
    pub slashes_last_24h: u64,
    pub suspicious_count: usize,
}

/// Tracks this node's own stake and the running count of slashes
/// observed in the last 24h (for `security_metrics`). Stake itself is
/// reported by the ledger client; this gate only judges it against the
/// configured minimum.
pub struct StakeGate {
    min_stake: u64,
    slashes_last_24h: AtomicU64,
}

impl StakeGate {
    pub fn new(min_stake: u64) -> Self {
        Self { min_stake, slashes_last_24h: AtomicU64::new(0) }
    }

    /// Checked on startup and every 5 minutes. A failure blocks new
    /// submissions and logs an alert; it never kills the node.
    pub fn check(&self, current_stake: u64) -> Result<(), OracleError> {
        super::check_stake(current_stake, self.min_stake)
    }

    pub fn record_slash(&self) {
        self.slashes_last_24h.fetch_add(1, Ordering::Relaxed);
    }

    /// Rolled over by the same background task that runs decay, once per
    /// day, so `slashes_last_24h` never grows unbounded.
    pub fn reset_daily_counter(&self) {
        self.slashes_last_24h.store(0, Ordering::Relaxed);
    }

    pub fn security_metrics(&self, table: &ReputationTable, total_staked: u64) -> SecurityMetrics {
        let snapshot = table.weights_snapshot();
        let avg_reputation = if snapshot.is_empty() {
            1.0
        } else {
            snapshot.values().sum::<f64>() / snapshot.len() as f64
        };

        SecurityMetrics {
            total_staked,
            avg_reputation,
            slashes_last_24h: self.slashes_last_24h.load(Ordering::Relaxed),
            suspicious_count: table.suspicious_nodes(0.3).len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReputationConfig;
    use crate::reputation::EventKind;

    #[test]
    fn test_check_ok_above_minimum() {
        let gate = StakeGate::new(1_000);
        assert!(gate.check(2_000).is_ok());
    }

    #[test]
    fn test_check_fails_below_minimum() {
        let gate = StakeGate::new(1_000);
        assert!(matches!(gate.check(500), Err(OracleError::StakeInsufficient { .. })));
    }

    #[test]
    fn test_security_metrics_averages_reputation() {
        let table = ReputationTable::new(ReputationConfig::default());
        table.update("a", EventKind::ConsensusSuccess, 0, serde_json::json!({}));
        table.update("b", EventKind::MaliciousBehavior, 0, serde_json::json!({}));

        let gate = StakeGate::new(1_000);
        gate.record_slash();
        let metrics = gate.security_metrics(&table, 5_000);

        assert_eq!(metrics.total_staked, 5_000);
        assert_eq!(metrics.slashes_last_24h, 1);
        assert!(metrics.suspicious_count >= 1);
    }

    #[test]
    fn test_reset_daily_counter() {
        let gate = StakeGate::new(1_000);
        gate.record_slash();
        gate.reset_daily_counter();
        let table = ReputationTable::new(ReputationConfig::default());
        assert_eq!(gate.security_metrics(&table, 0).slashes_last_24h, 0);
    }
}
