//! Connection loop: probe, classify, back off, repeat.

use crate::error::{ReconcileError, ReconcileResult};
use crate::report::{AttemptOutcome, ConnectionAttempt};
use crate::state::ReconcileState;
use sg_core::classify::CLASSIFIER_TABLE_VERSION;
use sg_core::{classify, BackoffPolicy, FailureClass, StoreFailure};
use sg_db::StoreProbe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Sleep for `duration` unless `shutdown` fires first. Returns `true` if cancelled.
pub async fn sleep_with_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Probe `store` until it answers, a fatal failure occurs, or the retry
/// budget in `policy` is spent.
///
/// Every transient failure is followed by `policy.delay(attempt)`, the last
/// one included, so an exhausted run has waited the policy's full budget.
pub async fn connect_with_retry<S>(
    store: &S,
    policy: &BackoffPolicy,
    shutdown: &CancellationToken,
    run_id: &Uuid,
) -> ReconcileResult<Vec<ConnectionAttempt>>
where
    S: StoreProbe + ?Sized,
{
    let mut attempts = Vec::new();
    let mut waited = Duration::ZERO;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if shutdown.is_cancelled() {
            return Err(cancelled());
        }

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(cancelled()),
            result = store.probe() => result,
        };

        let failure = match result {
            Ok(()) => {
                log::info!("[{run_id}] Connected on attempt {attempt}");
                attempts.push(ConnectionAttempt {
                    attempt,
                    outcome: AttemptOutcome::Connected,
                    wait: None,
                });
                return Ok(attempts);
            }
            Err(err) => err.failure(),
        };

        let class = classify(&failure);
        log::debug!(
            "[{run_id}] Attempt {attempt} failure classified {class} (classifier table v{CLASSIFIER_TABLE_VERSION})"
        );

        if class == FailureClass::Fatal {
            log::error!("[{run_id}] Attempt {attempt}: fatal connection failure: {failure}");
            return Err(ReconcileError::FatalConnection { attempt, failure });
        }

        let wait = policy.delay(attempt);
        log::warn!(
            "[{run_id}] Attempt {attempt}/{}: database not ready ({failure}); retrying in {}ms",
            policy.max_retries,
            wait.as_millis()
        );
        attempts.push(ConnectionAttempt {
            attempt,
            outcome: AttemptOutcome::Transient(failure.clone()),
            wait: Some(wait),
        });

        if sleep_with_shutdown(wait, shutdown).await {
            return Err(cancelled());
        }
        waited += wait;

        if !policy.should_retry(attempt) {
            return Err(exhausted(attempt, waited, failure));
        }
    }
}

fn cancelled() -> ReconcileError {
    ReconcileError::Cancelled {
        state: ReconcileState::Connecting,
    }
}

fn exhausted(attempts: u32, waited: Duration, last: StoreFailure) -> ReconcileError {
    ReconcileError::ConnectionExhausted {
        attempts,
        waited,
        last,
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
