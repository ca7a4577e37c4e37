//! Engine configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::power::VotingPowerStrategy;

/// Configuration for the governance engine.
///
/// Passed in at construction so callers and tests can vary policy per
/// instance instead of reading ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// How many days a proposal accepts votes after creation.
    pub voting_period_days: i64,
    /// Minimum total weighted votes for an outcome to count as decisive, in
    /// absolute weight units.
    pub quorum_threshold: f64,
    pub strategy: VotingPowerStrategy,
    /// Token balance that substitutes for the propose capability.
    pub min_propose_tokens: f64,
    /// Token balance that substitutes for the vote capability.
    pub min_vote_tokens: f64,
    /// Configuration keys a parameter-change proposal may write.
    pub parameter_allow_list: Vec<String>,
    /// Roles a membership proposal may grant or revoke.
    pub role_allow_list: Vec<String>,
    /// Capacity of the mirror publish queue.
    pub mirror_queue_depth: usize,
}

impl GovernanceConfig {
    pub fn voting_period(&self) -> Duration {
        Duration::days(self.voting_period_days)
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting_period_days: 7,
            quorum_threshold: 100.0,
            strategy: VotingPowerStrategy::default(),
            min_propose_tokens: 100.0,
            min_vote_tokens: 1.0,
            parameter_allow_list: vec![
                "governance.voting_period_days".to_string(),
                "governance.quorum_threshold".to_string(),
                "marketplace.fee_percentage".to_string(),
                "marketplace.default_royalty".to_string(),
                "history.retention_days".to_string(),
            ],
            role_allow_list: vec!["member".to_string(), "admin".to_string()],
            mirror_queue_depth: 64,
        }
    }
}
