//! Readiness signal shared with the rest of the application.
//!
//! The reconciler owns the [`ReadinessSignal`]; any number of collaborators
//! hold a [`ReadinessHandle`] and wait on it before accepting work.

use crate::state::ReconcileState;
use thiserror::Error;
use tokio::sync::watch;

/// Published readiness status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Reconciliation is running and currently in this state.
    InProgress(ReconcileState),
    /// Reconciliation finished; the schema matches the catalog.
    Ready,
    /// Reconciliation failed with this diagnostic.
    Failed(String),
}

impl Readiness {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Readiness::Ready | Readiness::Failed(_))
    }

    pub fn state(&self) -> ReconcileState {
        match self {
            Readiness::InProgress(state) => *state,
            Readiness::Ready => ReconcileState::Done,
            Readiness::Failed(_) => ReconcileState::Failed,
        }
    }
}

/// Why [`ReadinessHandle::wait_ready`] did not resolve to ready.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotReady {
    #[error("schema reconciliation failed: {0}")]
    Failed(String),

    #[error("schema reconciliation stopped without reporting readiness")]
    Abandoned,
}

/// Sending half, owned by the reconciler.
#[derive(Debug)]
pub struct ReadinessSignal {
    tx: watch::Sender<Readiness>,
}

/// Receiving half; cheap to clone.
#[derive(Debug, Clone)]
pub struct ReadinessHandle {
    rx: watch::Receiver<Readiness>,
}

/// Create a connected signal/handle pair starting in `Connecting`.
pub fn readiness_channel() -> (ReadinessSignal, ReadinessHandle) {
    let (tx, rx) = watch::channel(Readiness::InProgress(ReconcileState::Connecting));
    (ReadinessSignal { tx }, ReadinessHandle { rx })
}

impl ReadinessSignal {
    /// Publish a state change. Terminal states map to `Ready`/`Failed`
    /// through [`ReadinessSignal::ready`] and [`ReadinessSignal::fail`].
    pub fn enter(&self, state: ReconcileState) {
        self.tx.send_replace(Readiness::InProgress(state));
    }

    pub fn ready(&self) {
        self.tx.send_replace(Readiness::Ready);
    }

    pub fn fail(&self, diagnostic: impl Into<String>) {
        self.tx.send_replace(Readiness::Failed(diagnostic.into()));
    }

    pub fn current(&self) -> Readiness {
        self.tx.borrow().clone()
    }

    /// New handle observing this signal.
    pub fn subscribe(&self) -> ReadinessHandle {
        ReadinessHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl ReadinessHandle {
    pub fn current(&self) -> Readiness {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> ReconcileState {
        self.rx.borrow().state()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), Readiness::Ready)
    }

    /// Wait until reconciliation reaches a terminal state.
    pub async fn wait_ready(&self) -> Result<(), NotReady> {
        let mut rx = self.rx.clone();
        let status = match rx.wait_for(Readiness::is_terminal).await {
            Ok(status) => status.clone(),
            Err(_) => return Err(NotReady::Abandoned),
        };
        match status {
            Readiness::Ready => Ok(()),
            Readiness::Failed(diagnostic) => Err(NotReady::Failed(diagnostic)),
            Readiness::InProgress(_) => Err(NotReady::Abandoned),
        }
    }
}
