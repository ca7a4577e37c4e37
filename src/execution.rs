//! Execution of approved proposals.
//!
//! By the time the dispatcher runs, the proposal's approval is already
//! committed. Handler failures are therefore caught and logged, reported only
//! through the returned outcome; they never revert an approval and are left
//! for out-of-band retry against the audit trail.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::GovernanceConfig;
use crate::proposal::{MembershipOp, Proposal, ProposalAction};

/// Outcome of dispatching one approved proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The side effect was applied.
    Applied,
    /// The side effect was skipped; the proposal stays approved.
    Skipped { reason: String },
}

impl ExecutionOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Handler for `Custom` proposals, registered by name.
#[async_trait]
pub trait CustomProposalHandler: Send + Sync {
    async fn execute(
        &self,
        proposal: &Proposal,
        params: &serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Role directory consulted by membership proposals.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member_exists(&self, member_id: &str) -> bool;

    /// Grant a role. Returns false when the member is unknown.
    async fn add_role(&self, member_id: &str, role: &str) -> bool;

    /// Revoke a role. Returns false when the member is unknown.
    async fn remove_role(&self, member_id: &str, role: &str) -> bool;
}

/// In-memory role directory for tests and single-process embeddings.
#[derive(Default)]
pub struct MemoryDirectory {
    roles: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, member_id: &str) {
        self.roles
            .write()
            .await
            .entry(member_id.to_string())
            .or_default();
    }

    pub async fn roles_of(&self, member_id: &str) -> HashSet<String> {
        self.roles
            .read()
            .await
            .get(member_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MemberDirectory for MemoryDirectory {
    async fn member_exists(&self, member_id: &str) -> bool {
        self.roles.read().await.contains_key(member_id)
    }

    async fn add_role(&self, member_id: &str, role: &str) -> bool {
        let mut roles = self.roles.write().await;
        match roles.get_mut(member_id) {
            Some(set) => {
                set.insert(role.to_string());
                true
            }
            None => false,
        }
    }

    async fn remove_role(&self, member_id: &str, role: &str) -> bool {
        let mut roles = self.roles.write().await;
        match roles.get_mut(member_id) {
            Some(set) => {
                set.remove(role);
                true
            }
            None => false,
        }
    }
}

/// Mutable configuration store written by approved parameter changes.
///
/// Only keys in the allow-list may be written; anything else is logged and
/// skipped without failing the proposal.
pub struct ConfigStore {
    allow_list: HashSet<String>,
    values: RwLock<HashMap<String, String>>,
}

impl ConfigStore {
    pub fn new(allow_list: impl IntoIterator<Item = String>) -> Self {
        Self {
            allow_list: allow_list.into_iter().collect(),
            values: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    async fn apply(&self, key: &str, value: &str) -> bool {
        if !self.allow_list.contains(key) {
            return false;
        }
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        true
    }
}

/// Entry in the requested-features registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequestRecord {
    pub feature_name: String,
    pub description: String,
    pub proposal_id: String,
    pub approved_at: DateTime<Utc>,
}

/// Disbursement state of a recorded allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Pending,
    Disbursed,
}

/// Entry in the fund-allocation ledger.
///
/// Recording an allocation does not move funds; disbursement happens
/// elsewhere and is reflected back via [`FundLedger::mark_disbursed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundAllocationRecord {
    pub recipient: String,
    pub amount: f64,
    pub purpose: String,
    pub status: AllocationStatus,
    pub allocated_at: DateTime<Utc>,
    pub proposal_id: String,
}

/// Append-mostly ledger of approved fund allocations.
#[derive(Default)]
pub struct FundLedger {
    entries: RwLock<Vec<FundAllocationRecord>>,
}

impl FundLedger {
    pub async fn entries(&self) -> Vec<FundAllocationRecord> {
        self.entries.read().await.clone()
    }

    /// Flip a pending allocation to disbursed. Returns false when no pending
    /// entry exists for the proposal.
    pub async fn mark_disbursed(&self, proposal_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        for entry in entries.iter_mut() {
            if entry.proposal_id == proposal_id && entry.status == AllocationStatus::Pending {
                entry.status = AllocationStatus::Disbursed;
                return true;
            }
        }
        false
    }

    async fn append(&self, record: FundAllocationRecord) {
        self.entries.write().await.push(record);
    }
}

/// Maps an approved proposal to its side-effect handler.
pub struct ExecutionDispatcher {
    config_store: ConfigStore,
    features: RwLock<Vec<FeatureRequestRecord>>,
    funds: FundLedger,
    directory: Arc<dyn MemberDirectory>,
    role_allow_list: HashSet<String>,
    custom_handlers: DashMap<String, Arc<dyn CustomProposalHandler>>,
}

impl ExecutionDispatcher {
    pub fn new(config: &GovernanceConfig, directory: Arc<dyn MemberDirectory>) -> Self {
        Self {
            config_store: ConfigStore::new(config.parameter_allow_list.iter().cloned()),
            features: RwLock::new(Vec::new()),
            funds: FundLedger::default(),
            directory,
            role_allow_list: config.role_allow_list.iter().cloned().collect(),
            custom_handlers: DashMap::new(),
        }
    }

    /// Register a handler for `Custom` proposals with the given action name.
    pub fn register_handler(&self, name: impl Into<String>, handler: Arc<dyn CustomProposalHandler>) {
        self.custom_handlers.insert(name.into(), handler);
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn fund_ledger(&self) -> &FundLedger {
        &self.funds
    }

    pub async fn feature_requests(&self) -> Vec<FeatureRequestRecord> {
        self.features.read().await.clone()
    }

    /// Apply the side effect of an approved proposal.
    pub async fn execute(&self, proposal: &Proposal, now: DateTime<Utc>) -> ExecutionOutcome {
        match &proposal.action {
            ProposalAction::ParameterChange { key, value } => {
                if self.config_store.apply(key, value).await {
                    info!(proposal_id = %proposal.id, %key, %value, "configuration updated");
                    ExecutionOutcome::Applied
                } else {
                    warn!(proposal_id = %proposal.id, %key, "parameter key not in allow-list, change skipped");
                    ExecutionOutcome::skipped(format!("parameter key {key} not in allow-list"))
                }
            }
            ProposalAction::FeatureRequest {
                feature_name,
                description,
            } => {
                self.features.write().await.push(FeatureRequestRecord {
                    feature_name: feature_name.clone(),
                    description: description.clone(),
                    proposal_id: proposal.id.clone(),
                    approved_at: now,
                });
                info!(proposal_id = %proposal.id, %feature_name, "feature request registered");
                ExecutionOutcome::Applied
            }
            ProposalAction::FundAllocation {
                recipient,
                amount,
                purpose,
            } => {
                self.funds
                    .append(FundAllocationRecord {
                        recipient: recipient.clone(),
                        amount: *amount,
                        purpose: purpose.clone(),
                        status: AllocationStatus::Pending,
                        allocated_at: now,
                        proposal_id: proposal.id.clone(),
                    })
                    .await;
                // Notification event; delivery is handled outside the engine.
                info!(
                    target: "governance::notify",
                    proposal_id = %proposal.id,
                    %recipient,
                    amount = *amount,
                    %purpose,
                    "fund allocation approved"
                );
                ExecutionOutcome::Applied
            }
            ProposalAction::Membership {
                member_id,
                op,
                role,
            } => {
                if !self.role_allow_list.contains(role) {
                    warn!(proposal_id = %proposal.id, %role, "role not in allow-list, membership change skipped");
                    return ExecutionOutcome::skipped(format!("role {role} not in allow-list"));
                }
                if !self.directory.member_exists(member_id).await {
                    warn!(proposal_id = %proposal.id, %member_id, "unknown member, membership change skipped");
                    return ExecutionOutcome::skipped(format!("unknown member {member_id}"));
                }
                let applied = match op {
                    MembershipOp::AddRole => self.directory.add_role(member_id, role).await,
                    MembershipOp::RemoveRole => self.directory.remove_role(member_id, role).await,
                };
                if applied {
                    info!(proposal_id = %proposal.id, %member_id, %role, ?op, "membership updated");
                    ExecutionOutcome::Applied
                } else {
                    warn!(proposal_id = %proposal.id, %member_id, "directory refused membership change");
                    ExecutionOutcome::skipped(format!("directory refused change for {member_id}"))
                }
            }
            ProposalAction::Custom { name, params } => {
                let handler = match self.custom_handlers.get(name) {
                    Some(handler) => Arc::clone(handler.value()),
                    None => {
                        warn!(proposal_id = %proposal.id, %name, "no handler registered for custom action");
                        return ExecutionOutcome::skipped(format!("no handler registered for {name}"));
                    }
                };
                match handler.execute(proposal, params).await {
                    Ok(()) => {
                        info!(proposal_id = %proposal.id, %name, "custom handler executed");
                        ExecutionOutcome::Applied
                    }
                    Err(e) => {
                        error!(proposal_id = %proposal.id, %name, error = %e, "custom handler failed");
                        ExecutionOutcome::skipped(format!("handler {name} failed: {e}"))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::ProposalStatus;
    use chrono::Duration;

    fn approved(action: ProposalAction) -> Proposal {
        let now = Utc::now();
        let mut proposal = Proposal::new(
            "alice",
            "Test proposal",
            "An approved test proposal",
            action,
            now - Duration::days(8),
            now - Duration::days(1),
        );
        proposal.status = ProposalStatus::Approved;
        proposal
    }

    fn dispatcher() -> ExecutionDispatcher {
        ExecutionDispatcher::new(
            &GovernanceConfig::default(),
            Arc::new(MemoryDirectory::new()),
        )
    }

    #[test]
    fn parameter_outside_allow_list_is_skipped() {
        tokio_test::block_on(async {
            let dispatcher = dispatcher();
            let proposal = approved(ProposalAction::ParameterChange {
                key: "secrets.signing_key".into(),
                value: "oops".into(),
            });

            let outcome = dispatcher.execute(&proposal, Utc::now()).await;
            assert!(matches!(outcome, ExecutionOutcome::Skipped { .. }));
            assert_eq!(dispatcher.config_store().get("secrets.signing_key").await, None);
        });
    }

    #[test]
    fn allowed_parameter_is_applied() {
        tokio_test::block_on(async {
            let dispatcher = dispatcher();
            let proposal = approved(ProposalAction::ParameterChange {
                key: "marketplace.fee_percentage".into(),
                value: "2.5".into(),
            });

            let outcome = dispatcher.execute(&proposal, Utc::now()).await;
            assert_eq!(outcome, ExecutionOutcome::Applied);
            assert_eq!(
                dispatcher.config_store().get("marketplace.fee_percentage").await,
                Some("2.5".to_string())
            );
        });
    }

    #[test]
    fn fund_allocation_is_recorded_pending() {
        tokio_test::block_on(async {
            let dispatcher = dispatcher();
            let proposal = approved(ProposalAction::FundAllocation {
                recipient: "tool-library".into(),
                amount: 500.0,
                purpose: "shared tools".into(),
            });

            let outcome = dispatcher.execute(&proposal, Utc::now()).await;
            assert_eq!(outcome, ExecutionOutcome::Applied);

            let entries = dispatcher.fund_ledger().entries().await;
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].status, AllocationStatus::Pending);
            assert!(dispatcher.fund_ledger().mark_disbursed(&proposal.id).await);
            assert_eq!(
                dispatcher.fund_ledger().entries().await[0].status,
                AllocationStatus::Disbursed
            );
        });
    }

    #[test]
    fn unknown_custom_handler_is_skipped() {
        tokio_test::block_on(async {
            let dispatcher = dispatcher();
            let proposal = approved(ProposalAction::Custom {
                name: "unregistered".into(),
                params: serde_json::json!({}),
            });

            let outcome = dispatcher.execute(&proposal, Utc::now()).await;
            assert!(matches!(outcome, ExecutionOutcome::Skipped { .. }));
        });
    }
}
