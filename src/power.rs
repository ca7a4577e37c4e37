//! Voting-power strategies.

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityProvider;

/// Strategy mapping a member to the weight their vote carries.
///
/// Configured globally and applied uniformly to every proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingPowerStrategy {
    /// One member, one vote.
    Equal,
    /// Weight equals the member's token balance.
    TokenWeighted,
    /// Weight equals the square root of the token balance, so weight grows
    /// sub-linearly with holdings.
    Quadratic,
    /// Weight equals the member's stored reputation score.
    Reputation,
}

impl Default for VotingPowerStrategy {
    fn default() -> Self {
        Self::TokenWeighted
    }
}

/// Compute a member's voting weight under `strategy`.
///
/// Pure function of the provider's current values; the result is frozen into
/// the vote at cast time. Always non-negative. A zero balance or reputation
/// yields weight 0, which still permits the vote itself to be recorded.
pub async fn compute_power(
    provider: &dyn CapabilityProvider,
    member_id: &str,
    strategy: VotingPowerStrategy,
) -> f64 {
    let weight = match strategy {
        VotingPowerStrategy::Equal => 1.0,
        VotingPowerStrategy::TokenWeighted => provider.token_balance(member_id).await,
        VotingPowerStrategy::Quadratic => provider.token_balance(member_id).await.max(0.0).sqrt(),
        VotingPowerStrategy::Reputation => provider.reputation(member_id).await,
    };
    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MemberRecord, MemberRegistry};

    fn registry_with(balance: f64, reputation: Option<f64>) -> MemberRegistry {
        let registry = MemberRegistry::new();
        tokio_test::block_on(registry.upsert(
            "alice",
            MemberRecord {
                can_propose: true,
                can_vote: true,
                token_balance: balance,
                reputation,
            },
        ));
        registry
    }

    #[test]
    fn equal_strategy_is_one() {
        let registry = registry_with(5000.0, None);
        let power =
            tokio_test::block_on(compute_power(&registry, "alice", VotingPowerStrategy::Equal));
        assert_eq!(power, 1.0);
    }

    #[test]
    fn token_weighted_uses_balance() {
        let registry = registry_with(250.0, None);
        let power = tokio_test::block_on(compute_power(
            &registry,
            "alice",
            VotingPowerStrategy::TokenWeighted,
        ));
        assert_eq!(power, 250.0);
    }

    #[test]
    fn quadratic_takes_true_square_root() {
        let registry = registry_with(144.0, None);
        let power = tokio_test::block_on(compute_power(
            &registry,
            "alice",
            VotingPowerStrategy::Quadratic,
        ));
        assert_eq!(power, 12.0);
    }

    #[test]
    fn reputation_defaults_to_one_when_absent() {
        let registry = registry_with(0.0, None);
        let power = tokio_test::block_on(compute_power(
            &registry,
            "alice",
            VotingPowerStrategy::Reputation,
        ));
        assert_eq!(power, 1.0);

        let registry = registry_with(0.0, Some(3.5));
        let power = tokio_test::block_on(compute_power(
            &registry,
            "alice",
            VotingPowerStrategy::Reputation,
        ));
        assert_eq!(power, 3.5);
    }

    #[test]
    fn negative_balance_clamps_to_zero() {
        let registry = registry_with(-10.0, None);
        let power = tokio_test::block_on(compute_power(
            &registry,
            "alice",
            VotingPowerStrategy::TokenWeighted,
        ));
        assert_eq!(power, 0.0);
    }
}
