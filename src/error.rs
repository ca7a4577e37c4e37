//! Error types for governance operations.

use thiserror::Error;

/// Errors returned by governance operations.
///
/// Every variant is recoverable and reported to the caller; none is fatal to
/// the process. Ledger-mirror and execution-dispatcher failures are logged
/// where they occur and never surface through this type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// The member holds neither the required capability nor enough tokens.
    #[error("member {0} is not eligible for this operation")]
    Ineligible(String),

    /// Missing or malformed proposal fields or action payload.
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    /// Unknown proposal id.
    #[error("proposal not found: {0}")]
    NotFound(String),

    /// The voting window has elapsed or the proposal is no longer active.
    #[error("voting is closed for proposal {0}")]
    VotingClosed(String),

    /// A vote already exists for this (proposal, voter) pair.
    #[error("member {voter_id} has already voted on proposal {proposal_id}")]
    AlreadyVoted {
        proposal_id: String,
        voter_id: String,
    },

    /// The vote choice could not be parsed.
    #[error("invalid vote choice: {0}")]
    InvalidVote(String),
}

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
