//! Background supervision of the storage connection.
//!
//! The supervisor owns degraded mode: it connects, polls health, attempts a
//! bounded reconnect when a poll fails, and tears the store down when the
//! backend stays unreachable so command handlers fail fast.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep it healthy for the lifetime of
/// the process.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_match_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                backoff = INITIAL_BACKOFF;

                supervise(&state, store).await;

                warn!("storage backend lost; reconnecting from scratch");
                state.clear_match_store().await;
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
            }
        }

        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Poll the store's health until it fails beyond repair.
async fn supervise(state: &SharedState, store: Arc<dyn MatchStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect_with_backoff(state, store.as_ref()).await {
                    return;
                }
                state.update_degraded(false);
            }
        }

        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Bounded reconnect attempts with exponential backoff. Degraded mode is
/// entered on the first failed attempt.
async fn reconnect_with_backoff(state: &SharedState, store: &dyn MatchStore) -> bool {
    let mut backoff = INITIAL_BACKOFF;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnect succeeded");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    state.update_degraded(true);
                }
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    warn!("exhausted storage reconnect attempts; staying in degraded mode");
    false
}
