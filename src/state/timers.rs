//! Cancellable auto-confirm deadline tasks, keyed by match id.

use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::match_service;
use crate::state::SharedState;

/// Registry of pending auto-confirm timers.
///
/// Cancellation aborts the task; a task that already fired re-validates the
/// match state under the per-match lock inside the service call, so a
/// cancelled-but-already-fired timer is a safe no-op.
#[derive(Default)]
pub struct AutoConfirmTimers {
    tasks: DashMap<Uuid, JoinHandle<()>>,
}

impl AutoConfirmTimers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the auto-confirm deadline for a match, replacing any timer
    /// already pending for it.
    pub fn schedule(&self, state: SharedState, match_id: Uuid, delay: Duration) {
        debug!(%match_id, delay_secs = delay.as_secs(), "scheduling auto-confirm timer");

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            state.timers().forget(match_id);
            if let Err(err) = match_service::auto_confirm_timeout(&state, match_id).await {
                warn!(%match_id, error = %err, "auto-confirm timeout handling failed");
            }
        });

        if let Some(previous) = self.tasks.insert(match_id, handle) {
            previous.abort();
        }
    }

    /// Cancel the pending timer for a match. Returns whether one existed.
    pub fn cancel(&self, match_id: Uuid) -> bool {
        match self.tasks.remove(&match_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of timers currently pending.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    fn forget(&self, match_id: Uuid) {
        self.tasks.remove(&match_id);
    }
}
