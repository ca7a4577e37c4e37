//! Lifecycle engine orchestrating proposal creation, vote casting and
//! finalization.
//!
//! The engine is the only writer of the authoritative store. Capability
//! lookups and voting-power inputs come from the [`CapabilityProvider`];
//! approved proposals fan out to the [`ExecutionDispatcher`] after their
//! status transition has committed; every committed mutation is mirrored
//! best-effort and recorded in the audit trail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditLog};
use crate::capability::CapabilityProvider;
use crate::config::GovernanceConfig;
use crate::error::{GovernanceError, GovernanceResult};
use crate::execution::{ExecutionDispatcher, MemberDirectory};
use crate::mirror::{LedgerMirror, MirrorEvent, MirrorPublisher};
use crate::power::compute_power;
use crate::proposal::{FinalizationReason, Proposal, ProposalAction, ProposalStatus};
use crate::store::{FinalizeOutcome, GovernanceStore, ProposalCounts};
use crate::vote::{Vote, VoteChoice};

/// Outcome of finalizing one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationResult {
    pub proposal_id: String,
    pub status: ProposalStatus,
    pub reason: FinalizationReason,
    /// Whether the execution dispatcher ran during this call. False for
    /// rejections and for proposals that were already terminal.
    pub executed: bool,
}

/// The governance engine.
///
/// Construct inside a Tokio runtime (the mirror worker is spawned at build
/// time) and share behind an `Arc`; every operation takes `&self`.
pub struct GovernanceEngine {
    config: GovernanceConfig,
    capabilities: Arc<dyn CapabilityProvider>,
    store: GovernanceStore,
    dispatcher: ExecutionDispatcher,
    mirror: MirrorPublisher,
    audit: AuditLog,
}

impl GovernanceEngine {
    pub fn new(
        config: GovernanceConfig,
        capabilities: Arc<dyn CapabilityProvider>,
        directory: Arc<dyn MemberDirectory>,
        mirror: Arc<dyn LedgerMirror>,
    ) -> Self {
        let dispatcher = ExecutionDispatcher::new(&config, directory);
        let mirror = MirrorPublisher::spawn(mirror, config.mirror_queue_depth);
        Self {
            config,
            capabilities,
            store: GovernanceStore::new(),
            dispatcher,
            mirror,
            audit: AuditLog::new(),
        }
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Dispatcher accessor, used to register custom handlers and to inspect
    /// the side-effect stores.
    pub fn dispatcher(&self) -> &ExecutionDispatcher {
        &self.dispatcher
    }

    pub fn mirror(&self) -> &MirrorPublisher {
        &self.mirror
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Create a proposal.
    ///
    /// The creator must hold the propose capability or the configured token
    /// threshold. The proposal is active immediately; its voting window is
    /// fixed at creation.
    pub async fn propose(
        &self,
        creator_id: &str,
        title: &str,
        description: &str,
        action: ProposalAction,
    ) -> GovernanceResult<Proposal> {
        if !self.can_propose(creator_id).await {
            return Err(GovernanceError::Ineligible(creator_id.to_string()));
        }
        if title.trim().is_empty() || description.trim().is_empty() {
            return Err(GovernanceError::InvalidProposal(
                "title and description are required".into(),
            ));
        }
        action.validate()?;

        let now = Utc::now();
        let proposal = Proposal::new(
            creator_id,
            title,
            description,
            action,
            now,
            now + self.config.voting_period(),
        );
        self.store.insert_proposal(proposal.clone()).await;

        info!(
            proposal_id = %proposal.id,
            creator = creator_id,
            kind = proposal.action.kind(),
            voting_ends_at = %proposal.voting_ends_at,
            "proposal created"
        );
        self.audit
            .record(Some(creator_id), &proposal.id, AuditAction::ProposalCreated)
            .await;
        self.mirror.enqueue(MirrorEvent::Proposal(proposal.clone()));

        Ok(proposal)
    }

    /// Cast a vote.
    ///
    /// Checked in order: the proposal exists and is active, the window is
    /// open, the voter has not voted, the voter is eligible. The weight is
    /// computed under the configured strategy and frozen into the vote; the
    /// vote row and its tally delta commit as one atomic store operation.
    /// Callers translating untrusted input parse the choice with
    /// [`VoteChoice::from_str`], which yields `InvalidVote`.
    pub async fn cast_vote(
        &self,
        voter_id: &str,
        proposal_id: &str,
        choice: VoteChoice,
    ) -> GovernanceResult<Vote> {
        let proposal = self
            .store
            .get(proposal_id)
            .await
            .ok_or_else(|| GovernanceError::NotFound(proposal_id.to_string()))?;

        let now = Utc::now();
        if !proposal.is_open_at(now) {
            return Err(GovernanceError::VotingClosed(proposal_id.to_string()));
        }
        if self.store.has_voted(proposal_id, voter_id).await {
            return Err(GovernanceError::AlreadyVoted {
                proposal_id: proposal_id.to_string(),
                voter_id: voter_id.to_string(),
            });
        }
        if !self.can_vote(voter_id).await {
            return Err(GovernanceError::Ineligible(voter_id.to_string()));
        }

        let power = compute_power(self.capabilities.as_ref(), voter_id, self.config.strategy).await;
        let vote = Vote {
            proposal_id: proposal_id.to_string(),
            voter_id: voter_id.to_string(),
            choice,
            voting_power: power,
            cast_at: now,
        };
        // The store re-validates under its write lock; two racing casts for
        // the same voter cannot both pass.
        self.store.record_vote(vote.clone(), now).await?;

        debug!(proposal_id, voter_id, ?choice, power, "vote recorded");
        self.audit
            .record(
                Some(voter_id),
                proposal_id,
                AuditAction::VoteCast { choice, power },
            )
            .await;
        self.mirror.enqueue(MirrorEvent::Vote {
            proposal_id: proposal_id.to_string(),
            voter_id: voter_id.to_string(),
            choice,
            power,
        });

        Ok(vote)
    }

    pub async fn get_proposal(&self, proposal_id: &str) -> GovernanceResult<Proposal> {
        self.store
            .get(proposal_id)
            .await
            .ok_or_else(|| GovernanceError::NotFound(proposal_id.to_string()))
    }

    /// List proposals, optionally filtered by status, newest first.
    pub async fn list_proposals(&self, status: Option<ProposalStatus>) -> Vec<Proposal> {
        self.store.list(status).await
    }

    pub async fn proposal_counts(&self) -> ProposalCounts {
        self.store.counts().await
    }

    /// Votes recorded for a proposal, heaviest first.
    pub async fn votes_for(&self, proposal_id: &str) -> Vec<Vote> {
        self.store.votes_for(proposal_id).await
    }

    /// Finalize a single proposal if its voting window has lapsed.
    ///
    /// Idempotent: an already-terminal proposal returns its recorded outcome
    /// without running the dispatcher again. Returns `Ok(None)` while voting
    /// is still open.
    pub async fn finalize_proposal(
        &self,
        proposal_id: &str,
        now: DateTime<Utc>,
    ) -> GovernanceResult<Option<FinalizationResult>> {
        let outcome = self
            .store
            .finalize_due(proposal_id, self.config.quorum_threshold, now)
            .await?;

        match outcome {
            FinalizeOutcome::StillOpen => Ok(None),
            FinalizeOutcome::AlreadyFinal(status, reason) => Ok(Some(FinalizationResult {
                proposal_id: proposal_id.to_string(),
                status,
                reason,
                executed: false,
            })),
            FinalizeOutcome::Transitioned { proposal, reason } => {
                info!(
                    proposal_id = %proposal.id,
                    status = ?proposal.status,
                    ?reason,
                    yes = proposal.tally.yes,
                    no = proposal.tally.no,
                    total = proposal.tally.total,
                    "proposal finalized"
                );
                self.audit
                    .record(
                        None,
                        &proposal.id,
                        AuditAction::ProposalFinalized {
                            status: proposal.status,
                            reason,
                        },
                    )
                    .await;

                // The transition is committed; execution is best-effort from
                // here and cannot push the proposal back to active.
                let executed = proposal.status == ProposalStatus::Approved;
                if executed {
                    let outcome = self.dispatcher.execute(&proposal, now).await;
                    self.audit
                        .record(None, &proposal.id, AuditAction::ProposalExecuted { outcome })
                        .await;
                    self.mirror.enqueue(MirrorEvent::Execution {
                        proposal_id: proposal.id.clone(),
                    });
                }

                Ok(Some(FinalizationResult {
                    proposal_id: proposal.id,
                    status: proposal.status,
                    reason,
                    executed,
                }))
            }
        }
    }

    /// Scan for proposals whose voting window ended before `now` and
    /// finalize each one.
    ///
    /// Intended to be driven by an external periodic trigger; idempotent and
    /// safe to call concurrently with itself and with ongoing casts. One
    /// proposal failing never aborts the rest of the batch.
    pub async fn scan_and_finalize(&self, now: DateTime<Utc>) -> Vec<FinalizationResult> {
        let due = self.store.due_for_finalization(now).await;
        if !due.is_empty() {
            debug!(count = due.len(), "finalizing due proposals");
        }

        let mut results = Vec::new();
        for proposal_id in due {
            match self.finalize_proposal(&proposal_id, now).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => {
                    warn!(proposal_id = %proposal_id, error = %e, "failed to finalize proposal");
                }
            }
        }
        results
    }

    async fn can_propose(&self, member_id: &str) -> bool {
        if self.capabilities.has_propose_capability(member_id).await {
            return true;
        }
        self.capabilities.token_balance(member_id).await >= self.config.min_propose_tokens
    }

    async fn can_vote(&self, member_id: &str) -> bool {
        if self.capabilities.has_vote_capability(member_id).await {
            return true;
        }
        self.capabilities.token_balance(member_id).await >= self.config.min_vote_tokens
    }
}
