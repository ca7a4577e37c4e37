//! Append-only log of governance actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::execution::ExecutionOutcome;
use crate::proposal::{FinalizationReason, ProposalStatus};
use crate::vote::VoteChoice;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    ProposalCreated,
    VoteCast {
        choice: VoteChoice,
        power: f64,
    },
    ProposalFinalized {
        status: ProposalStatus,
        reason: FinalizationReason,
    },
    ProposalExecuted {
        outcome: ExecutionOutcome,
    },
}

impl AuditAction {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditAction::ProposalCreated => "proposal_created",
            AuditAction::VoteCast { .. } => "vote_cast",
            AuditAction::ProposalFinalized { .. } => "proposal_finalized",
            AuditAction::ProposalExecuted { .. } => "proposal_executed",
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub at: DateTime<Utc>,
    /// Acting member, when the action was member-initiated.
    pub actor: Option<String>,
    pub proposal_id: String,
    pub action: AuditAction,
}

/// Filter for querying the log. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub proposal_id: Option<String>,
    pub action_kind: Option<String>,
    pub actor: Option<String>,
    /// Maximum records to return, newest first. Defaults to 50.
    pub limit: Option<usize>,
}

/// In-memory append-only audit trail of engine activity.
#[derive(Default)]
pub struct AuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn record(
        &self,
        actor: Option<&str>,
        proposal_id: &str,
        action: AuditAction,
    ) {
        let mut records = self.records.write().await;
        let seq = records.len() as u64 + 1;
        records.push(AuditRecord {
            seq,
            at: Utc::now(),
            actor: actor.map(str::to_string),
            proposal_id: proposal_id.to_string(),
            action,
        });
    }

    /// Matching records, newest first.
    pub async fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        let limit = query.limit.unwrap_or(50);
        records
            .iter()
            .rev()
            .filter(|r| {
                query
                    .proposal_id
                    .as_ref()
                    .map_or(true, |id| &r.proposal_id == id)
                    && query
                        .action_kind
                        .as_ref()
                        .map_or(true, |kind| r.action.kind() == kind)
                    && query.actor.as_ref().map_or(true, |actor| {
                        r.actor.as_deref() == Some(actor.as_str())
                    })
            })
            .take(limit)
            .cloned()
            .collect()
    }
}
