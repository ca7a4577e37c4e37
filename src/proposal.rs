//! Proposal entities and their typed action payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GovernanceError, GovernanceResult};
use crate::vote::VoteChoice;

/// Status of a proposal.
///
/// `Active` is the only non-terminal state; a proposal is active immediately
/// on creation and moves exactly once to `Approved` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Active,
    Approved,
    Rejected,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Active)
    }
}

/// Why a proposal reached its terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationReason {
    QuorumNotMet,
    MajorityApproval,
    MajorityRejection,
}

/// Role operations a membership proposal can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOp {
    AddRole,
    RemoveRole,
}

/// The typed action payload of a proposal.
///
/// The four built-in kinds are checked exhaustively at compile time; anything
/// else goes through `Custom`, dispatched by name against the handler
/// registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposalAction {
    ParameterChange {
        key: String,
        value: String,
    },
    FeatureRequest {
        feature_name: String,
        description: String,
    },
    FundAllocation {
        recipient: String,
        amount: f64,
        purpose: String,
    },
    Membership {
        member_id: String,
        op: MembershipOp,
        role: String,
    },
    Custom {
        name: String,
        params: serde_json::Value,
    },
}

impl ProposalAction {
    /// Validate the payload before a proposal is accepted.
    pub fn validate(&self) -> GovernanceResult<()> {
        match self {
            ProposalAction::ParameterChange { key, .. } => {
                if key.trim().is_empty() {
                    return Err(GovernanceError::InvalidProposal(
                        "parameter key is required".into(),
                    ));
                }
            }
            ProposalAction::FeatureRequest { feature_name, .. } => {
                if feature_name.trim().is_empty() {
                    return Err(GovernanceError::InvalidProposal(
                        "feature name is required".into(),
                    ));
                }
            }
            ProposalAction::FundAllocation {
                recipient, amount, ..
            } => {
                if recipient.trim().is_empty() {
                    return Err(GovernanceError::InvalidProposal(
                        "allocation recipient is required".into(),
                    ));
                }
                if !amount.is_finite() || *amount <= 0.0 {
                    return Err(GovernanceError::InvalidProposal(
                        "allocation amount must be positive".into(),
                    ));
                }
            }
            ProposalAction::Membership {
                member_id, role, ..
            } => {
                if member_id.trim().is_empty() || role.trim().is_empty() {
                    return Err(GovernanceError::InvalidProposal(
                        "membership changes need a member and a role".into(),
                    ));
                }
            }
            ProposalAction::Custom { name, .. } => {
                if name.trim().is_empty() {
                    return Err(GovernanceError::InvalidProposal(
                        "custom action name is required".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Short kind name used in logs and mirror events.
    pub fn kind(&self) -> &'static str {
        match self {
            ProposalAction::ParameterChange { .. } => "parameter_change",
            ProposalAction::FeatureRequest { .. } => "feature_request",
            ProposalAction::FundAllocation { .. } => "fund_allocation",
            ProposalAction::Membership { .. } => "membership",
            ProposalAction::Custom { .. } => "custom",
        }
    }
}

/// Weighted vote totals for one proposal.
///
/// Maintained incrementally from the frozen weight of each recorded vote;
/// `total == yes + no + abstain` holds at all times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: f64,
    pub no: f64,
    pub abstain: f64,
    pub total: f64,
}

impl Tally {
    /// Apply one vote's weight to the matching bucket and the total.
    pub fn record(&mut self, choice: VoteChoice, power: f64) {
        match choice {
            VoteChoice::Yes => self.yes += power,
            VoteChoice::No => self.no += power,
            VoteChoice::Abstain => self.abstain += power,
        }
        self.total += power;
    }

    /// Apply the decision rule to the frozen tally.
    ///
    /// Quorum is an absolute weight threshold. Only a strict yes-majority
    /// approves; a tie rejects.
    pub fn decide(&self, quorum_threshold: f64) -> (ProposalStatus, FinalizationReason) {
        if self.total < quorum_threshold {
            (ProposalStatus::Rejected, FinalizationReason::QuorumNotMet)
        } else if self.yes > self.no {
            (ProposalStatus::Approved, FinalizationReason::MajorityApproval)
        } else {
            (ProposalStatus::Rejected, FinalizationReason::MajorityRejection)
        }
    }
}

/// A governance item subject to a timed vote.
///
/// Created active, mutated only by vote casts (tally) and finalization
/// (status, finalized_at, reason), never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub action: ProposalAction,
    pub creator_id: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    /// End of the voting window, fixed at creation.
    pub voting_ends_at: DateTime<Utc>,
    pub tally: Tally,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalization_reason: Option<FinalizationReason>,
}

impl Proposal {
    pub fn new(
        creator_id: &str,
        title: &str,
        description: &str,
        action: ProposalAction,
        created_at: DateTime<Utc>,
        voting_ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            action,
            creator_id: creator_id.to_string(),
            status: ProposalStatus::Active,
            created_at,
            voting_ends_at,
            tally: Tally::default(),
            finalized_at: None,
            finalization_reason: None,
        }
    }

    /// Whether the proposal accepts votes at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ProposalStatus::Active && now < self.voting_ends_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_total_tracks_buckets() {
        let mut tally = Tally::default();
        tally.record(VoteChoice::Yes, 60.0);
        tally.record(VoteChoice::No, 20.0);
        tally.record(VoteChoice::Abstain, 10.0);

        assert_eq!(tally.yes, 60.0);
        assert_eq!(tally.no, 20.0);
        assert_eq!(tally.abstain, 10.0);
        assert_eq!(tally.total, tally.yes + tally.no + tally.abstain);
    }

    #[test]
    fn zero_weight_vote_leaves_tally_unchanged() {
        let mut tally = Tally::default();
        tally.record(VoteChoice::Abstain, 0.0);
        assert_eq!(tally.total, 0.0);
    }

    #[test]
    fn decision_rule() {
        let below_quorum = Tally {
            yes: 60.0,
            no: 20.0,
            abstain: 10.0,
            total: 90.0,
        };
        assert_eq!(
            below_quorum.decide(100.0),
            (ProposalStatus::Rejected, FinalizationReason::QuorumNotMet)
        );

        let approved = Tally {
            yes: 75.0,
            no: 20.0,
            abstain: 10.0,
            total: 105.0,
        };
        assert_eq!(
            approved.decide(100.0),
            (ProposalStatus::Approved, FinalizationReason::MajorityApproval)
        );

        let tie = Tally {
            yes: 50.0,
            no: 50.0,
            abstain: 0.0,
            total: 100.0,
        };
        assert_eq!(
            tie.decide(100.0),
            (ProposalStatus::Rejected, FinalizationReason::MajorityRejection)
        );
    }

    #[test]
    fn quorum_is_strictly_less_than() {
        // A total exactly at the threshold meets quorum.
        let at_threshold = Tally {
            yes: 100.0,
            no: 0.0,
            abstain: 0.0,
            total: 100.0,
        };
        assert_eq!(
            at_threshold.decide(100.0),
            (ProposalStatus::Approved, FinalizationReason::MajorityApproval)
        );
    }

    #[test]
    fn action_validation() {
        assert!(ProposalAction::ParameterChange {
            key: "marketplace.fee_percentage".into(),
            value: "2.5".into(),
        }
        .validate()
        .is_ok());

        let err = ProposalAction::FundAllocation {
            recipient: "community-lab".into(),
            amount: -5.0,
            purpose: "equipment".into(),
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProposal(_)));

        let err = ProposalAction::Membership {
            member_id: "".into(),
            op: MembershipOp::AddRole,
            role: "member".into(),
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProposal(_)));
    }
}
