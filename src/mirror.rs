//! Best-effort mirroring of governance events to an external ledger.
//!
//! The local store is authoritative; the mirror is an audit and transparency
//! layer. Events are handed to a background worker after local state has
//! committed, so a slow or unavailable chain can never stall a governance
//! operation or roll one back.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::proposal::Proposal;
use crate::vote::VoteChoice;

/// Error type mirror implementations may surface. Failures are logged and
/// parked, never propagated to governance callers.
pub type MirrorError = Box<dyn std::error::Error + Send + Sync>;

/// Events published to the external ledger mirror.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    Proposal(Proposal),
    Vote {
        proposal_id: String,
        voter_id: String,
        choice: VoteChoice,
        power: f64,
    },
    Execution {
        proposal_id: String,
    },
}

/// External distributed-ledger mirror.
#[async_trait]
pub trait LedgerMirror: Send + Sync {
    async fn publish_proposal(&self, proposal: &Proposal) -> Result<(), MirrorError>;

    async fn publish_vote(
        &self,
        proposal_id: &str,
        voter_id: &str,
        choice: VoteChoice,
        power: f64,
    ) -> Result<(), MirrorError>;

    async fn publish_execution(&self, proposal_id: &str) -> Result<(), MirrorError>;
}

/// Mirror that only logs events. The default when no chain is configured.
pub struct LoggingMirror;

#[async_trait]
impl LedgerMirror for LoggingMirror {
    async fn publish_proposal(&self, proposal: &Proposal) -> Result<(), MirrorError> {
        info!(proposal_id = %proposal.id, kind = proposal.action.kind(), "mirror: proposal");
        Ok(())
    }

    async fn publish_vote(
        &self,
        proposal_id: &str,
        voter_id: &str,
        choice: VoteChoice,
        power: f64,
    ) -> Result<(), MirrorError> {
        info!(proposal_id, voter_id, ?choice, power, "mirror: vote");
        Ok(())
    }

    async fn publish_execution(&self, proposal_id: &str) -> Result<(), MirrorError> {
        info!(proposal_id, "mirror: execution");
        Ok(())
    }
}

/// Fire-and-forget publisher decoupling the request path from the mirror.
///
/// Events go through a bounded queue drained by a background worker. A full
/// queue drops the event rather than blocking the caller. A failed publish is
/// retried once, then the event is parked in the dead-letter buffer where it
/// stays inspectable for out-of-band replay.
pub struct MirrorPublisher {
    tx: mpsc::Sender<MirrorEvent>,
    dead_letters: Arc<Mutex<Vec<MirrorEvent>>>,
}

impl MirrorPublisher {
    /// Spawn the worker task. Must be called from within a Tokio runtime.
    pub fn spawn(mirror: Arc<dyn LedgerMirror>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<MirrorEvent>(queue_depth);
        let dead_letters = Arc::new(Mutex::new(Vec::new()));
        let parked = Arc::clone(&dead_letters);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if Self::deliver(mirror.as_ref(), &event).await.is_err() {
                    // One retry, then park.
                    if let Err(e) = Self::deliver(mirror.as_ref(), &event).await {
                        warn!(error = %e, ?event, "mirror publish failed after retry, parking event");
                        parked.lock().await.push(event);
                    }
                }
            }
        });

        Self { tx, dead_letters }
    }

    /// Enqueue an event without blocking.
    pub fn enqueue(&self, event: MirrorEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "mirror queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(?event, "mirror worker stopped, event dropped");
            }
        }
    }

    /// Events that failed both delivery attempts.
    pub async fn dead_letters(&self) -> Vec<MirrorEvent> {
        self.dead_letters.lock().await.clone()
    }

    async fn deliver(mirror: &dyn LedgerMirror, event: &MirrorEvent) -> Result<(), MirrorError> {
        match event {
            MirrorEvent::Proposal(proposal) => mirror.publish_proposal(proposal).await,
            MirrorEvent::Vote {
                proposal_id,
                voter_id,
                choice,
                power,
            } => {
                mirror
                    .publish_vote(proposal_id, voter_id, *choice, *power)
                    .await
            }
            MirrorEvent::Execution { proposal_id } => mirror.publish_execution(proposal_id).await,
        }
    }
}
