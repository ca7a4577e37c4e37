//! Authoritative proposal store and vote ledger.
//!
//! One write lock spans the proposal map and the vote map, so recording a
//! vote and applying its tally delta are a single indivisible step, and the
//! `Active` -> terminal transition doubles as the finalization guard. Checks
//! done outside the lock are re-run under it; the lock, not a check-then-act
//! sequence, is what enforces the one-vote-per-member invariant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{GovernanceError, GovernanceResult};
use crate::proposal::{FinalizationReason, Proposal, ProposalStatus};
use crate::vote::Vote;

/// Proposal totals per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalCounts {
    pub active: usize,
    pub approved: usize,
    pub rejected: usize,
}

/// Result of a conditional finalization attempt.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// This call performed the transition.
    Transitioned {
        proposal: Proposal,
        reason: FinalizationReason,
    },
    /// Another call already finalized the proposal; carries the stored
    /// terminal outcome.
    AlreadyFinal(ProposalStatus, FinalizationReason),
    /// The voting window has not elapsed yet.
    StillOpen,
}

#[derive(Default)]
struct StoreInner {
    proposals: HashMap<String, Proposal>,
    /// Vote rows keyed by `(proposal_id, voter_id)`; the key is the
    /// uniqueness constraint.
    votes: HashMap<(String, String), Vote>,
}

/// In-process single source of truth for proposals and votes.
#[derive(Default)]
pub struct GovernanceStore {
    inner: RwLock<StoreInner>,
}

impl GovernanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_proposal(&self, proposal: Proposal) {
        self.inner
            .write()
            .await
            .proposals
            .insert(proposal.id.clone(), proposal);
    }

    pub async fn get(&self, id: &str) -> Option<Proposal> {
        self.inner.read().await.proposals.get(id).cloned()
    }

    /// List proposals, optionally filtered by status, newest first.
    pub async fn list(&self, status: Option<ProposalStatus>) -> Vec<Proposal> {
        let inner = self.inner.read().await;
        let mut result: Vec<Proposal> = inner
            .proposals
            .values()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    pub async fn counts(&self) -> ProposalCounts {
        let inner = self.inner.read().await;
        let mut counts = ProposalCounts::default();
        for proposal in inner.proposals.values() {
            match proposal.status {
                ProposalStatus::Active => counts.active += 1,
                ProposalStatus::Approved => counts.approved += 1,
                ProposalStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }

    pub async fn has_voted(&self, proposal_id: &str, voter_id: &str) -> bool {
        self.inner
            .read()
            .await
            .votes
            .contains_key(&(proposal_id.to_string(), voter_id.to_string()))
    }

    /// Votes recorded for a proposal, heaviest first.
    pub async fn votes_for(&self, proposal_id: &str) -> Vec<Vote> {
        let inner = self.inner.read().await;
        let mut votes: Vec<Vote> = inner
            .votes
            .values()
            .filter(|v| v.proposal_id == proposal_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| {
            b.voting_power
                .partial_cmp(&a.voting_power)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        votes
    }

    /// Atomically record a vote and apply its tally delta.
    ///
    /// Status, window and uniqueness are re-checked under the write lock; a
    /// concurrent duplicate fails with `AlreadyVoted` instead of overwriting,
    /// and a vote row is never inserted without its tally increment.
    pub async fn record_vote(&self, vote: Vote, now: DateTime<Utc>) -> GovernanceResult<()> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let proposal = inner
            .proposals
            .get_mut(&vote.proposal_id)
            .ok_or_else(|| GovernanceError::NotFound(vote.proposal_id.clone()))?;

        if proposal.status != ProposalStatus::Active || now >= proposal.voting_ends_at {
            return Err(GovernanceError::VotingClosed(vote.proposal_id.clone()));
        }

        let key = (vote.proposal_id.clone(), vote.voter_id.clone());
        if inner.votes.contains_key(&key) {
            return Err(GovernanceError::AlreadyVoted {
                proposal_id: vote.proposal_id.clone(),
                voter_id: vote.voter_id.clone(),
            });
        }

        proposal.tally.record(vote.choice, vote.voting_power);
        inner.votes.insert(key, vote);
        Ok(())
    }

    /// Conditionally move a proposal out of `Active` once its window lapsed.
    ///
    /// The transition is the idempotency guard: a proposal already moved by a
    /// concurrent call reports `AlreadyFinal` and must not be re-processed.
    pub async fn finalize_due(
        &self,
        id: &str,
        quorum_threshold: f64,
        now: DateTime<Utc>,
    ) -> GovernanceResult<FinalizeOutcome> {
        let mut guard = self.inner.write().await;
        let proposal = guard
            .proposals
            .get_mut(id)
            .ok_or_else(|| GovernanceError::NotFound(id.to_string()))?;

        if proposal.status.is_terminal() {
            // Status and reason are written together; a terminal record with
            // no reason is treated as not finalized.
            return Ok(match proposal.finalization_reason {
                Some(reason) => FinalizeOutcome::AlreadyFinal(proposal.status, reason),
                None => FinalizeOutcome::StillOpen,
            });
        }
        if now <= proposal.voting_ends_at {
            return Ok(FinalizeOutcome::StillOpen);
        }

        let (status, reason) = proposal.tally.decide(quorum_threshold);
        proposal.status = status;
        proposal.finalized_at = Some(now);
        proposal.finalization_reason = Some(reason);
        Ok(FinalizeOutcome::Transitioned {
            proposal: proposal.clone(),
            reason,
        })
    }

    /// Ids of active proposals whose voting window ended before `now`.
    pub async fn due_for_finalization(&self, now: DateTime<Utc>) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Active && p.voting_ends_at < now)
            .map(|p| p.id.clone())
            .collect()
    }
}
