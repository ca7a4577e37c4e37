//! Vote entities.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

/// A voter's choice on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl FromStr for VoteChoice {
    type Err = GovernanceError;

    /// Parse a choice from untrusted caller input. Anything other than
    /// `yes`, `no` or `abstain` is `InvalidVote`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(VoteChoice::Yes),
            "no" => Ok(VoteChoice::No),
            "abstain" => Ok(VoteChoice::Abstain),
            other => Err(GovernanceError::InvalidVote(other.to_string())),
        }
    }
}

/// A recorded vote.
///
/// Identity is the `(proposal_id, voter_id)` pair; the ledger rejects a
/// second vote for the same pair instead of overwriting the first. A vote is
/// immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: String,
    pub voter_id: String,
    pub choice: VoteChoice,
    /// Weight computed and frozen at cast time. Later changes to the voter's
    /// balance or reputation do not alter a recorded vote.
    pub voting_power: f64,
    pub cast_at: DateTime<Utc>,
}
