use serde::{Deserialize, Serialize};

/// Reasons a slash proposal can cite. The four auto-slash reasons bypass
/// peer voting entirely; any other reason needs a 75% vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlashReason {
    DataManipulation,
    DoubleSpending,
    MaliciousConsensus,
    StakeBelowMinimum,
    DataQualityLow,
}

impl SlashReason {
    fn is_auto_slash(self) -> bool {
        matches!(
            self,
            Self::DataManipulation | Self::DoubleSpending | Self::MaliciousConsensus | Self::StakeBelowMinimum
        )
    }
}

const VOTE_APPROVAL_THRESHOLD: f64 = 0.75;
pub const SLASH_REPUTATION_PENALTY: f64 = -0.20;

/// Append-only record of an executed slash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashRecord {
    pub target: String,
    pub amount: u64,
    pub reason: SlashReason,
    pub timestamp: u64,
    pub tx_ref: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlashDecision {
    /// Peer votes did not clear the 75% threshold; no action taken.
    Rejected,
    /// Approved (auto-slash or by vote); `amount` already capped to the
    /// target's available stake.
    Approved { amount: u64 },
}

/// Evaluates a slash proposal: auto-slash reasons skip voting; other
/// reasons need `votes_for / (votes_for + votes_against) >= 0.75`. The
/// approved amount is capped to `target_stake` — never slash more than
/// the peer actually has locked.
pub fn evaluate_slash(
    reason: SlashReason,
    proposed_amount: u64,
    target_stake: u64,
    votes_for: u32,
    votes_against: u32,
) -> SlashDecision {
    let approved = if reason.is_auto_slash() {
        true
    } else {
        let total = votes_for + votes_against;
        total > 0 && (votes_for as f64 / total as f64) >= VOTE_APPROVAL_THRESHOLD
    };

    if !approved {
        return SlashDecision::Rejected;
    }

    SlashDecision::Approved { amount: proposed_amount.min(target_stake) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_slash_reasons_skip_voting() {
        let decision = evaluate_slash(SlashReason::DataManipulation, 500, 1_000, 0, 0);
        assert_eq!(decision, SlashDecision::Approved { amount: 500 });
    }

    #[test]
    fn test_vote_below_threshold_rejected() {
        let decision = evaluate_slash(SlashReason::DataQualityLow, 500, 1_000, 2, 2);
        assert_eq!(decision, SlashDecision::Rejected);
    }

    #[test]
    fn test_vote_meets_threshold_approved() {
        let decision = evaluate_slash(SlashReason::DataQualityLow, 500, 1_000, 6, 1);
        assert_eq!(decision, SlashDecision::Approved { amount: 500 });
    }

    #[test]
    fn test_amount_capped_to_available_stake() {
        let decision = evaluate_slash(SlashReason::StakeBelowMinimum, 2_000, 300, 0, 0);
        assert_eq!(decision, SlashDecision::Approved { amount: 300 });
    }

    #[test]
    fn test_no_votes_at_all_rejected() {
        let decision = evaluate_slash(SlashReason::DataQualityLow, 100, 1_000, 0, 0);
        assert_eq!(decision, SlashDecision::Rejected);
    }
}
