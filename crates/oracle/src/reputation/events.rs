use serde::{Deserialize, Serialize};

/// Event kinds and their reputation impact. Fixed per the table; not
/// currently read from config (the defaults are the only values the
/// distilled spec assigns meaning to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConsensusSuccess,
    ConsensusFailure,
    DataQualityHigh,
    DataQualityLow,
    UptimeGood,
    UptimePoor,
    MaliciousBehavior,
    StakeIncrease,
    StakeSlash,
}

impl EventKind {
    pub fn impact(self) -> f64 {
        match self {
            Self::ConsensusSuccess => 0.05,
            Self::ConsensusFailure => -0.10,
            Self::DataQualityHigh => 0.03,
            Self::DataQualityLow => -0.05,
            Self::UptimeGood => 0.02,
            Self::UptimePoor => -0.08,
            Self::MaliciousBehavior => -0.50,
            Self::StakeIncrease => 0.10,
            Self::StakeSlash => -0.30,
        }
    }
}

/// Append-only audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationEvent {
    pub node_id: String,
    pub kind: EventKind,
    pub impact: f64,
    pub timestamp: u64,
    pub details: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impacts_match_table() {
        assert_eq!(EventKind::ConsensusSuccess.impact(), 0.05);
        assert_eq!(EventKind::StakeSlash.impact(), -0.30);
        assert_eq!(EventKind::MaliciousBehavior.impact(), -0.50);
    }
}
