//! Ready/active handshake operations driving a scheduled match to live.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, MatchState},
    error::ServiceError,
    services::{
        match_service::{advance, commit_match, participant_slot},
        notify::NotificationEvent,
    },
    state::{SharedState, match_machine::MatchEvent},
};

fn ensure_pre_live(entity: &MatchEntity) -> Result<(), ServiceError> {
    match entity.state {
        MatchState::Scheduled | MatchState::AwaitingActivation => Ok(()),
        other => Err(ServiceError::InvalidState(format!(
            "handshake actions are not allowed while the match is {other:?}"
        ))),
    }
}

/// Declare the caller ready to play. Repeats are no-ops.
pub async fn mark_ready(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        ensure_pre_live(entity)?;
        let slot = participant_slot(entity, user_id)?;
        if entity.ready.mark_ready(slot) {
            entity.ready_at.get_or_insert(SystemTime::now());
            advance(entity, MatchEvent::ReadyFlagged)?;
        }
        Ok(())
    })
    .await?;

    Ok(entity)
}

/// Retract a ready declaration before the caller committed to playing.
pub async fn mark_not_ready(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        ensure_pre_live(entity)?;
        let slot = participant_slot(entity, user_id)?;
        entity
            .ready
            .mark_not_ready(slot)
            .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
        entity.state = if entity.ready.one.ready || entity.ready.two.ready {
            MatchState::AwaitingActivation
        } else {
            MatchState::Scheduled
        };
        Ok(())
    })
    .await?;

    Ok(entity)
}

/// Confirm the match is actually underway for the caller's side.
///
/// Returns whether this call took the match live; repeating the call once
/// the match is live is a no-op.
pub async fn confirm_active(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
) -> Result<(bool, MatchEntity), ServiceError> {
    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let (entity, newly_live) = commit_match(state, &store, match_id, |entity| {
        let slot = participant_slot(entity, user_id)?;
        if entity.state == MatchState::Live && entity.ready.is_active_confirmed(slot) {
            return Ok(false);
        }
        ensure_pre_live(entity)?;
        entity
            .ready
            .confirm_active(slot)
            .map_err(|err| ServiceError::InvalidState(err.to_string()))?;

        if entity.ready.handshake_completed() {
            advance(entity, MatchEvent::HandshakeCompleted)?;
            let now = SystemTime::now();
            entity.active_confirmed_at = Some(now);
            entity.live_at = Some(now);
            Ok(true)
        } else {
            Ok(false)
        }
    })
    .await?;

    if newly_live {
        state
            .notifier()
            .dispatch(NotificationEvent::MatchLive { match_id });
        info!(%match_id, "both participants confirmed active; match is live");
    }

    Ok((newly_live, entity))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::memory::InMemoryMatchStore,
        state::AppState,
    };

    async fn seeded_state() -> (SharedState, Uuid, Uuid, Uuid) {
        let state = AppState::new(AppConfig::with_auto_confirm_window(Duration::from_secs(600)));
        state
            .install_match_store(Arc::new(InMemoryMatchStore::new()))
            .await;

        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let entity = MatchEntity::new(Uuid::new_v4(), 1, 1, Some(p1), Some(p2));
        let match_id = entity.id;
        let store = state.require_match_store().await.unwrap();
        store.insert_match(entity).await.unwrap();

        (state, match_id, p1, p2)
    }

    #[tokio::test]
    async fn full_handshake_takes_the_match_live() {
        let (state, match_id, p1, p2) = seeded_state().await;

        let entity = mark_ready(&state, match_id, p1).await.unwrap();
        assert_eq!(entity.state, MatchState::AwaitingActivation);
        assert!(entity.ready_at.is_some());

        mark_ready(&state, match_id, p2).await.unwrap();

        let (live, entity) = confirm_active(&state, match_id, p1).await.unwrap();
        assert!(!live);
        assert_eq!(entity.state, MatchState::AwaitingActivation);

        let (live, entity) = confirm_active(&state, match_id, p2).await.unwrap();
        assert!(live);
        assert_eq!(entity.state, MatchState::Live);
        assert!(entity.live_at.is_some());
    }

    #[tokio::test]
    async fn mark_ready_is_idempotent() {
        let (state, match_id, p1, _p2) = seeded_state().await;

        let first = mark_ready(&state, match_id, p1).await.unwrap();
        let second = mark_ready(&state, match_id, p1).await.unwrap();
        assert_eq!(first.version, second.version);
        assert_eq!(first.ready_at, second.ready_at);
    }

    #[tokio::test]
    async fn confirm_active_requires_ready() {
        let (state, match_id, p1, _p2) = seeded_state().await;

        let err = confirm_active(&state, match_id, p1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn retract_before_opponent_commits() {
        let (state, match_id, p1, p2) = seeded_state().await;

        mark_ready(&state, match_id, p1).await.unwrap();
        mark_ready(&state, match_id, p2).await.unwrap();

        let entity = mark_not_ready(&state, match_id, p2).await.unwrap();
        assert_eq!(entity.state, MatchState::AwaitingActivation);
        assert!(!entity.ready.two.ready);

        let entity = mark_not_ready(&state, match_id, p1).await.unwrap();
        assert_eq!(entity.state, MatchState::Scheduled);
    }

    #[tokio::test]
    async fn cannot_retract_after_confirming_active() {
        let (state, match_id, p1, _p2) = seeded_state().await;

        mark_ready(&state, match_id, p1).await.unwrap();
        confirm_active(&state, match_id, p1).await.unwrap();

        let err = mark_not_ready(&state, match_id, p1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn repeat_confirm_after_live_is_a_noop() {
        let (state, match_id, p1, p2) = seeded_state().await;

        mark_ready(&state, match_id, p1).await.unwrap();
        mark_ready(&state, match_id, p2).await.unwrap();
        confirm_active(&state, match_id, p1).await.unwrap();
        let (live, entity) = confirm_active(&state, match_id, p2).await.unwrap();
        assert!(live);

        let (live_again, repeat) = confirm_active(&state, match_id, p2).await.unwrap();
        assert!(!live_again);
        assert_eq!(repeat.version, entity.version);
        assert_eq!(repeat.state, MatchState::Live);
    }

    #[tokio::test]
    async fn outsiders_cannot_join_the_handshake() {
        let (state, match_id, _p1, _p2) = seeded_state().await;

        let err = mark_ready(&state, match_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotParticipant(_)));
    }

    #[tokio::test]
    async fn handshake_rejected_once_live() {
        let (state, match_id, p1, p2) = seeded_state().await;

        mark_ready(&state, match_id, p1).await.unwrap();
        mark_ready(&state, match_id, p2).await.unwrap();
        confirm_active(&state, match_id, p1).await.unwrap();
        confirm_active(&state, match_id, p2).await.unwrap();

        let err = mark_not_ready(&state, match_id, p1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
