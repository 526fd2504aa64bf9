//! Reconciliation states.

use std::fmt;

/// State of one reconciliation run.
///
/// Runs move `Connecting → Locking → Planning → Applying → Done`; `Failed`
/// is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileState {
    Connecting,
    Locking,
    Planning,
    Applying,
    Done,
    Failed,
}

impl ReconcileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::Connecting => "connecting",
            ReconcileState::Locking => "locking",
            ReconcileState::Planning => "planning",
            ReconcileState::Applying => "applying",
            ReconcileState::Done => "done",
            ReconcileState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcileState::Done | ReconcileState::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: ReconcileState) -> bool {
        use ReconcileState::*;
        match (self, next) {
            (Connecting, Locking) | (Locking, Planning) | (Planning, Applying) | (Applying, Done) => {
                true
            }
            (from, Failed) => !from.is_terminal(),
            // A finished reconciler may be run again.
            (Done | Failed, Connecting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
