//! Member capability and voting-power input lookups.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Lookup interface answering who may propose, who may vote, and the raw
/// inputs the voting-power strategies consume.
///
/// Implementations are expected to be fast, side-effect-free lookups against
/// a reasonably current view of the membership; the engine imposes no
/// staleness bound and callers own their timeout and retry policy.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn has_propose_capability(&self, member_id: &str) -> bool;

    async fn has_vote_capability(&self, member_id: &str) -> bool;

    async fn token_balance(&self, member_id: &str) -> f64;

    /// Stored reputation score, defaulting to 1.0 when the member has none.
    async fn reputation(&self, member_id: &str) -> f64;
}

/// Capability and balance data for one member of a [`MemberRegistry`].
#[derive(Debug, Clone, Default)]
pub struct MemberRecord {
    pub can_propose: bool,
    pub can_vote: bool,
    pub token_balance: f64,
    pub reputation: Option<f64>,
}

/// In-memory capability provider for tests and single-process embeddings.
#[derive(Default)]
pub struct MemberRegistry {
    members: RwLock<HashMap<String, MemberRecord>>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, member_id: &str, record: MemberRecord) {
        self.members
            .write()
            .await
            .insert(member_id.to_string(), record);
    }

    pub async fn set_balance(&self, member_id: &str, balance: f64) {
        let mut members = self.members.write().await;
        members.entry(member_id.to_string()).or_default().token_balance = balance;
    }
}

#[async_trait]
impl CapabilityProvider for MemberRegistry {
    async fn has_propose_capability(&self, member_id: &str) -> bool {
        self.members
            .read()
            .await
            .get(member_id)
            .map(|m| m.can_propose)
            .unwrap_or(false)
    }

    async fn has_vote_capability(&self, member_id: &str) -> bool {
        self.members
            .read()
            .await
            .get(member_id)
            .map(|m| m.can_vote)
            .unwrap_or(false)
    }

    async fn token_balance(&self, member_id: &str) -> f64 {
        self.members
            .read()
            .await
            .get(member_id)
            .map(|m| m.token_balance)
            .unwrap_or(0.0)
    }

    async fn reputation(&self, member_id: &str) -> f64 {
        self.members
            .read()
            .await
            .get(member_id)
            .and_then(|m| m.reputation)
            .unwrap_or(1.0)
    }
}
