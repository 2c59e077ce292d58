//! Idle shutdown and drain.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use feedback_jobs::ReportOrchestrator;

/// Resolve once no request has been in flight or pending for `idle`.
///
/// A caller that passed identity but has not been admitted yet counts as
/// busy. Any event or pending change while idle restarts the countdown.
pub async fn wait_for_idle(orchestrator: &ReportOrchestrator, idle: Duration) {
    let mut rx = orchestrator.events().subscribe();
    let mut pending = orchestrator.pending_requests();
    loop {
        if orchestrator.is_busy() {
            tokio::select! {
                received = rx.recv() => if let Err(RecvError::Closed) = received {
                    return;
                },
                changed = pending.changed() => if changed.is_err() {
                    return;
                },
            }
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(idle) => {
                info!(idle_secs = idle.as_secs(), "No report in flight, idle timeout reached");
                return;
            }
            received = rx.recv() => match received {
                Err(RecvError::Closed) => return,
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Idle watcher lagged"),
                Ok(_) => debug!("Activity while idle, countdown restarted"),
            },
            changed = pending.changed() => match changed {
                Err(_) => return,
                Ok(()) => debug!("Request pending while idle, countdown restarted"),
            },
        }
    }
}

/// Resolve once every pending and in-flight request has finished.
pub async fn wait_for_drain(orchestrator: &ReportOrchestrator) {
    let mut rx = orchestrator.events().subscribe();
    let mut pending = orchestrator.pending_requests();
    while orchestrator.is_busy() {
        debug!(
            in_flight = orchestrator.working_set().len(),
            pending = *pending.borrow(),
            "Draining report requests"
        );
        tokio::select! {
            received = rx.recv() => if let Err(RecvError::Closed) = received {
                return;
            },
            changed = pending.changed() => if changed.is_err() {
                return;
            },
        }
    }
}
