//! Reputation & Stake Gate (C5): the single writer of node reputation
//! scores, the stake gate, and the slashing protocol.
//!
//! Grounded on `original_source/src/security/reputation.py`
//! (`ReputationSystem`) for the event table, decay, and tiered consensus
//! weight, and `original_source/src/security/staking.py`
//! (`StakingManager`) for the stake gate and slashing flow.

mod events;
mod slashing;
mod staking;

pub use events::{EventKind, ReputationEvent};
pub use slashing::{evaluate_slash, SlashDecision, SlashRecord, SlashReason};
pub use staking::{SecurityMetrics, StakeGate};

use std::collections::HashMap;
use std::sync::RwLock;

use oracle_core::OracleError;

use crate::config::ReputationConfig;

const DEFAULT_REPUTATION: f64 = 0.8;
const DECAY_TARGET: f64 = 0.5;
const MIN_REPUTATION: f64 = 0.0;
const MAX_REPUTATION: f64 = 1.0;

#[derive(Debug, Clone)]
struct NodeRecord {
    reputation: f64,
    last_seen: u64,
}

/// Single-writer table of node reputations plus an append-only event log.
/// All reads (including the weights the Aggregator consults) go through
/// snapshot methods; only `update` and `apply_decay` mutate state.
pub struct ReputationTable {
    config: ReputationConfig,
    nodes: RwLock<HashMap<String, NodeRecord>>,
    events: RwLock<Vec<ReputationEvent>>,
}

impl ReputationTable {
    pub fn new(config: ReputationConfig) -> Self {
        Self { config, nodes: RwLock::new(HashMap::new()), events: RwLock::new(Vec::new()) }
    }

    /// Returns the node's current reputation, creating it at the default
    /// on first observation.
    pub fn reputation(&self, node_id: &str, now: u64) -> f64 {
        if let Some(record) = self.nodes.read().unwrap().get(node_id) {
            return record.reputation;
        }
        let mut nodes = self.nodes.write().unwrap();
        nodes
            .entry(node_id.to_string())
            .or_insert(NodeRecord { reputation: DEFAULT_REPUTATION, last_seen: now })
            .reputation
    }

    /// A `node_id -> reputation` snapshot suitable for the Aggregator's
    /// weighted median.
    pub fn weights_snapshot(&self) -> HashMap<String, f64> {
        self.nodes.read().unwrap().iter().map(|(k, v)| (k.clone(), v.reputation)).collect()
    }

    /// Applies an event's configured impact, clamps to `[0,1]`, appends
    /// the audit entry, and touches `last_seen`.
    pub fn update(&self, node_id: &str, kind: EventKind, now: u64, details: serde_json::Value) {
        let impact = kind.impact();
        let mut nodes = self.nodes.write().unwrap();
        let record =
            nodes.entry(node_id.to_string()).or_insert(NodeRecord { reputation: DEFAULT_REPUTATION, last_seen: now });
        record.reputation = (record.reputation + impact).clamp(MIN_REPUTATION, MAX_REPUTATION);
        record.last_seen = now;

        self.events.write().unwrap().push(ReputationEvent {
            node_id: node_id.to_string(),
            kind,
            impact,
            timestamp: now,
            details,
        });
    }

    /// Linear decay toward 0.5 at `decay_rate` per day; called by a
    /// background task once per day (or pro-rated by `elapsed_days`).
    pub fn apply_decay(&self, elapsed_days: f64) {
        let mut nodes = self.nodes.write().unwrap();
        for record in nodes.values_mut() {
            let decay_amount = self.config.decay_rate * elapsed_days * (record.reputation - DECAY_TARGET);
            record.reputation = (record.reputation - decay_amount).clamp(MIN_REPUTATION, MAX_REPUTATION);
        }
    }

    pub fn trusted_nodes(&self, min_reputation: f64) -> Vec<String> {
        self.nodes
            .read()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.reputation >= min_reputation)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn suspicious_nodes(&self, max_reputation: f64) -> Vec<String> {
        self.nodes
            .read()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.reputation <= max_reputation)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Reputation-tier consensus weight: ≥0.8→1.0, ≥0.6→0.8, ≥0.4→0.5,
    /// ≥0.2→0.2, else 0.1.
    pub fn consensus_weight(&self, node_id: &str, now: u64) -> f64 {
        tier_weight(self.reputation(node_id, now))
    }

    pub fn events_for(&self, node_id: &str, since: u64) -> Vec<ReputationEvent> {
        let mut events: Vec<ReputationEvent> =
            self.events.read().unwrap().iter().filter(|e| e.node_id == node_id && e.timestamp >= since).cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
    }

    /// Drops events older than `event_retention_days`, counted from `now`.
    pub fn cleanup_events(&self, now: u64) {
        let cutoff = now.saturating_sub(self.config.event_retention_days * 86_400);
        self.events.write().unwrap().retain(|e| e.timestamp >= cutoff);
    }

    /// Per-node summary: current reputation plus how many of each event
    /// kind it has accrued. Used by the health surface's reputation
    /// report, not by any consensus-path logic.
    pub fn reputation_report(&self) -> Vec<NodeReputationSummary> {
        let nodes = self.nodes.read().unwrap();
        let events = self.events.read().unwrap();
        nodes
            .iter()
            .map(|(node_id, record)| NodeReputationSummary {
                node_id: node_id.clone(),
                reputation: record.reputation,
                last_seen: record.last_seen,
                event_count: events.iter().filter(|e| &e.node_id == node_id).count(),
            })
            .collect()
    }

    /// Serializable dump of the whole table, for the optional audit log
    /// and for tests that want to assert on table shape directly.
    pub fn export_snapshot(&self) -> ReputationSnapshot {
        let nodes = self.nodes.read().unwrap();
        ReputationSnapshot {
            nodes: nodes
                .iter()
                .map(|(id, r)| (id.clone(), NodeSnapshot { reputation: r.reputation, last_seen: r.last_seen }))
                .collect(),
            events: self.events.read().unwrap().clone(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeReputationSummary {
    pub node_id: String,
    pub reputation: f64,
    pub last_seen: u64,
    pub event_count: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeSnapshot {
    pub reputation: f64,
    pub last_seen: u64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReputationSnapshot {
    pub nodes: HashMap<String, NodeSnapshot>,
    pub events: Vec<ReputationEvent>,
}

pub(crate) fn tier_weight(reputation: f64) -> f64 {
    if reputation >= 0.8 {
        1.0
    } else if reputation >= 0.6 {
        0.8
    } else if reputation >= 0.4 {
        0.5
    } else if reputation >= 0.2 {
        0.2
    } else {
        0.1
    }
}

/// Checks `stake(self) >= min_stake`. Failure is a soft block, not a
/// kill: the node keeps running but new submissions are refused until
/// stake recovers.
pub fn check_stake(current_stake: u64, min_stake: u64) -> Result<(), OracleError> {
    if current_stake < min_stake {
        return Err(OracleError::StakeInsufficient { have: current_stake, need: min_stake });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReputationTable {
        ReputationTable::new(ReputationConfig::default())
    }

    #[test]
    fn test_new_node_starts_at_default() {
        let t = table();
        assert_eq!(t.reputation("node-a", 0), 0.8);
    }

    #[test]
    fn test_update_clamped_to_range() {
        let t = table();
        for _ in 0..20 {
            t.update("node-a", EventKind::MaliciousBehavior, 0, serde_json::json!({}));
        }
        assert_eq!(t.reputation("node-a", 0), 0.0);
    }

    #[test]
    fn test_update_applies_impact() {
        let t = table();
        t.update("node-a", EventKind::ConsensusSuccess, 0, serde_json::json!({}));
        assert!((t.reputation("node-a", 0) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_decay_moves_toward_half() {
        let t = table();
        t.update("node-a", EventKind::StakeIncrease, 0, serde_json::json!({}));
        let before = t.reputation("node-a", 0);
        t.apply_decay(1.0);
        let after = t.reputation("node-a", 0);
        assert!(after < before);
        assert!(after > 0.5);
    }

    #[test]
    fn test_trusted_and_suspicious() {
        let t = table();
        t.reputation("trusted", 0);
        t.update("trusted", EventKind::ConsensusSuccess, 0, serde_json::json!({}));
        t.update("suspect", EventKind::MaliciousBehavior, 0, serde_json::json!({}));
        assert!(t.trusted_nodes(0.7).contains(&"trusted".to_string()));
        assert!(t.suspicious_nodes(0.3).contains(&"suspect".to_string()));
    }

    #[test]
    fn test_consensus_weight_tiers() {
        assert_eq!(tier_weight(0.9), 1.0);
        assert_eq!(tier_weight(0.65), 0.8);
        assert_eq!(tier_weight(0.45), 0.5);
        assert_eq!(tier_weight(0.25), 0.2);
        assert_eq!(tier_weight(0.05), 0.1);
    }

    #[test]
    fn test_check_stake() {
        assert!(check_stake(2_000, 1_000).is_ok());
        assert!(matches!(check_stake(500, 1_000), Err(OracleError::StakeInsufficient { .. })));
    }

    #[test]
    fn test_event_retention_cleanup() {
        let t = table();
        t.update("node-a", EventKind::ConsensusSuccess, 0, serde_json::json!({}));
        t.update("node-a", EventKind::ConsensusSuccess, 100 * 86_400, serde_json::json!({}));
        t.cleanup_events(100 * 86_400);
        let events = t.events_for("node-a", 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_reputation_report_counts_events() {
        let t = table();
        t.update("node-a", EventKind::ConsensusSuccess, 0, serde_json::json!({}));
        t.update("node-a", EventKind::DataQualityHigh, 1, serde_json::json!({}));
        let report = t.reputation_report();
        let entry = report.iter().find(|r| r.node_id == "node-a").unwrap();
        assert_eq!(entry.event_count, 2);
    }

    #[test]
    fn test_export_snapshot_roundtrips_via_json() {
        let t = table();
        t.update("node-a", EventKind::ConsensusSuccess, 0, serde_json::json!({}));
        let snapshot = t.export_snapshot();
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let parsed: ReputationSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.nodes.len(), 1);
        assert_eq!(parsed.events.len(), 1);
    }
}
