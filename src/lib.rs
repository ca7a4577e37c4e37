//! Decentralized governance proposal and voting engine.
//!
//! Provides eligibility-gated proposal creation, exactly-once weighted
//! voting, quorum-based finalization of time-boxed proposals, and dispatch of
//! the side effects approved proposals carry. The local store is the single
//! source of truth; an external ledger mirror receives best-effort copies of
//! every committed event.

pub mod audit;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod mirror;
pub mod power;
pub mod proposal;
pub mod store;
pub mod vote;

pub use audit::{AuditAction, AuditLog, AuditQuery, AuditRecord};
pub use capability::{CapabilityProvider, MemberRecord, MemberRegistry};
pub use config::GovernanceConfig;
pub use engine::{FinalizationResult, GovernanceEngine};
pub use error::{GovernanceError, GovernanceResult};
pub use execution::{
    AllocationStatus, CustomProposalHandler, ExecutionDispatcher, ExecutionOutcome,
    FeatureRequestRecord, FundAllocationRecord, FundLedger, MemberDirectory, MemoryDirectory,
};
pub use mirror::{LedgerMirror, LoggingMirror, MirrorError, MirrorEvent, MirrorPublisher};
pub use power::{compute_power, VotingPowerStrategy};
pub use proposal::{
    FinalizationReason, MembershipOp, Proposal, ProposalAction, ProposalStatus, Tally,
};
pub use store::{GovernanceStore, ProposalCounts};
pub use vote::{Vote, VoteChoice};
