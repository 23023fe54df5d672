pub mod handshake;
pub mod match_machine;
pub mod timers;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::match_store::MatchStore,
    error::ServiceError,
    services::notify::{LogNotifier, Notifier},
    state::timers::AutoConfirmTimers,
};

/// Shared handle to the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, per-match locks, pending
/// auto-confirm timers, and the notification seam.
pub struct AppState {
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timers: AutoConfirmTimers,
    notifier: Arc<dyn Notifier>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Construct the state with a custom notification dispatcher.
    pub fn with_notifier(config: AppConfig, notifier: Arc<dyn Notifier>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            match_store: RwLock::new(None),
            locks: DashMap::new(),
            timers: AutoConfirmTimers::new(),
            notifier,
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the match store or fail with the degraded-mode error.
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn install_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag. Set while no store is installed and while the
    /// supervisor is fighting to reconnect one.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Per-match exclusive lock. Every state-mutating operation acquires
    /// this before validating preconditions, so exactly one transition wins
    /// a race; unrelated matches are never serialized against each other.
    pub fn match_lock(&self, match_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(match_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Registry of pending auto-confirm timers.
    pub fn timers(&self) -> &AutoConfirmTimers {
        &self.timers
    }

    /// Notification dispatch seam.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Update the degraded flag, broadcasting only actual changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::match_store::memory::InMemoryMatchStore;

    #[tokio::test]
    async fn degraded_watch_follows_store_lifecycle() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(*watcher.borrow_and_update());

        state
            .install_match_store(Arc::new(InMemoryMatchStore::new()))
            .await;
        watcher.changed().await.unwrap();
        assert!(!*watcher.borrow_and_update());
        assert!(!state.is_degraded());

        state.clear_match_store().await;
        watcher.changed().await.unwrap();
        assert!(*watcher.borrow_and_update());
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn repeated_updates_do_not_rebroadcast() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();

        // Already degraded at startup; setting the same value is silent.
        state.update_degraded(true);
        assert!(!watcher.has_changed().unwrap());

        state.update_degraded(false);
        state.update_degraded(false);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(!watcher.has_changed().unwrap());
    }
}
