//! Score reporting, confirmation, disputes, and the auto-confirm deadline.
//!
//! Every mutation acquires the per-match lock, then re-reads and commits the
//! entity through an optimistic version check. The lock serializes racing
//! participants within this process; the version check catches writers on
//! other instances sharing the same store.

use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{DisputeEntity, MatchEntity, MatchState},
        storage::StorageError,
    },
    dto::matches::{DisputeRequest, ReportScoreRequest},
    error::ServiceError,
    services::{bracket_service, notify::NotificationEvent},
    state::{
        SharedState,
        handshake::ParticipantSlot,
        match_machine::{MatchEvent, compute_transition},
    },
};

/// Fetch a match or fail with a not-found error.
pub(crate) async fn load_match(
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))
}

/// Apply a mutation to a match and persist it through the version check.
///
/// The caller must hold the per-match lock. The closure validates
/// preconditions against the freshly loaded entity and mutates it; when it
/// leaves the entity untouched nothing is written, which is how idempotent
/// repeats stay cheap. A lost version race is retried a bounded number of
/// times before surfacing as a conflict.
pub(crate) async fn commit_match<T>(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    mut apply: impl FnMut(&mut MatchEntity) -> Result<T, ServiceError>,
) -> Result<(MatchEntity, T), ServiceError> {
    let mut attempts_left = state.config().conflict_retries();

    loop {
        let current = load_match(store, match_id).await?;
        let mut updated = current.clone();
        let outcome = apply(&mut updated)?;

        if updated == current {
            return Ok((current, outcome));
        }

        match store.update_match(updated).await {
            Ok(stored) => return Ok((stored, outcome)),
            Err(StorageError::Conflict { .. }) if attempts_left > 0 => {
                attempts_left -= 1;
                debug!(%match_id, attempts_left, "match update lost a version race; retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Apply a lifecycle event to the entity's state, or reject with
/// [`ServiceError::InvalidState`].
pub(crate) fn advance(entity: &mut MatchEntity, event: MatchEvent) -> Result<(), ServiceError> {
    let next = compute_transition(entity.state, event)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
    entity.state = next;
    Ok(())
}

/// Resolve which slot the caller occupies, or reject outsiders.
pub(crate) fn participant_slot(
    entity: &MatchEntity,
    user_id: Uuid,
) -> Result<ParticipantSlot, ServiceError> {
    entity.slot_of(user_id).ok_or_else(|| {
        ServiceError::NotParticipant(format!(
            "user `{user_id}` is not a participant of match `{}`",
            entity.id
        ))
    })
}

fn validate_scores(score1: i64, score2: i64) -> Result<(u32, u32), ServiceError> {
    if score1 < 0 || score2 < 0 {
        return Err(ServiceError::InvalidScore(
            "scores must be non-negative".into(),
        ));
    }
    if score1 == score2 {
        return Err(ServiceError::InvalidScore(
            "tied scores cannot decide an elimination match".into(),
        ));
    }

    let score1 = u32::try_from(score1)
        .map_err(|_| ServiceError::InvalidScore(format!("score {score1} is out of range")))?;
    let score2 = u32::try_from(score2)
        .map_err(|_| ServiceError::InvalidScore(format!("score {score2} is out of range")))?;

    Ok((score1, score2))
}

/// Submit the outcome of a live match.
///
/// The reported winner is stored immediately as provisional; it only becomes
/// authoritative once the match completes through confirmation, timeout, or
/// an admin decision.
pub async fn report_score(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
    request: ReportScoreRequest,
) -> Result<MatchEntity, ServiceError> {
    request.validate()?;

    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let window = state.config().auto_confirm_window();
    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        advance(entity, MatchEvent::ScoreReported)?;
        participant_slot(entity, user_id)?;
        let (score1, score2) =
            validate_scores(request.participant1_score, request.participant2_score)?;

        let winner_id = if score1 > score2 {
            entity.participant1_id
        } else {
            entity.participant2_id
        };

        let now = SystemTime::now();
        entity.reported_by = Some(user_id);
        entity.participant1_score = Some(score1);
        entity.participant2_score = Some(score2);
        entity.evidence_ref = request.evidence_ref.clone();
        entity.reported_at = Some(now);
        entity.auto_confirm_at = Some(now + window);
        entity.winner_id = winner_id;
        Ok(())
    })
    .await?;

    state.timers().schedule(state.clone(), match_id, window);
    state.notifier().dispatch(NotificationEvent::ScoreReported {
        match_id,
        reported_by: user_id,
    });
    info!(%match_id, reporter = %user_id, "score reported; awaiting confirmation");

    Ok(entity)
}

/// Accept the pending report as the opposing participant.
pub async fn confirm_score(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        advance(entity, MatchEvent::ScoreConfirmed)?;
        participant_slot(entity, user_id)?;
        if entity.reported_by == Some(user_id) {
            return Err(ServiceError::NotAuthorized(
                "the reporting participant cannot confirm their own report".into(),
            ));
        }
        entity.completed_at = Some(SystemTime::now());
        Ok(())
    })
    .await?;

    state.timers().cancel(match_id);
    info!(%match_id, confirmer = %user_id, winner = ?entity.winner_id, "score confirmed; match completed");
    finalize_completion(state, &store, &entity).await;

    Ok(entity)
}

/// Contest the pending report as the opposing participant.
pub async fn dispute(
    state: &SharedState,
    match_id: Uuid,
    user_id: Uuid,
    request: DisputeRequest,
) -> Result<(DisputeEntity, MatchEntity), ServiceError> {
    request.validate()?;

    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        advance(entity, MatchEvent::DisputeOpened)?;
        participant_slot(entity, user_id)?;
        if entity.reported_by == Some(user_id) {
            return Err(ServiceError::NotAuthorized(
                "the reporting participant cannot dispute their own report".into(),
            ));
        }
        Ok(())
    })
    .await?;

    state.timers().cancel(match_id);

    let dispute = DisputeEntity::open(match_id, user_id, request.reason, request.evidence_ref);
    store.insert_dispute(dispute.clone()).await?;

    state.notifier().dispatch(NotificationEvent::DisputeOpened {
        match_id,
        dispute_id: dispute.id,
        raised_by: user_id,
    });
    info!(%match_id, dispute_id = %dispute.id, raised_by = %user_id, "score report disputed");

    Ok((dispute, entity))
}

/// Finalize a pending report whose confirmation window elapsed.
///
/// Invoked by the timer task; a deadline that fires after a confirmation or
/// dispute already landed is a no-op.
pub async fn auto_confirm_timeout(
    state: &SharedState,
    match_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let current = load_match(&store, match_id).await?;
    if current.state != MatchState::AwaitingConfirmation {
        debug!(%match_id, state = ?current.state, "auto-confirm deadline fired after the match moved on");
        return Ok(());
    }

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        advance(entity, MatchEvent::AutoConfirmElapsed)?;
        entity.completed_at = Some(SystemTime::now());
        Ok(())
    })
    .await?;

    info!(%match_id, winner = ?entity.winner_id, "confirmation window elapsed; report auto-confirmed");
    finalize_completion(state, &store, &entity).await;

    Ok(())
}

/// Emit the completion notification and advance the winner in the bracket.
///
/// The match itself is already committed, so an advancement failure is
/// logged rather than surfaced to the caller.
pub(crate) async fn finalize_completion(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    entity: &MatchEntity,
) {
    if let Some(winner_id) = entity.winner_id {
        state.notifier().dispatch(NotificationEvent::MatchCompleted {
            match_id: entity.id,
            winner_id,
        });
    }

    if let Err(err) = bracket_service::on_match_completed(state, store, entity).await {
        warn!(match_id = %entity.id, error = %err, "bracket advancement failed");
    }
}

/// Fetch one match.
pub async fn get_match(state: &SharedState, match_id: Uuid) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    load_match(&store, match_id).await
}

/// Fetch every match of a tournament, ordered by round and position.
pub async fn list_bracket(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<Vec<MatchEntity>, ServiceError> {
    let store = state.require_match_store().await?;
    let matches = store.list_matches(tournament_id).await?;
    if matches.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "tournament `{tournament_id}` has no matches"
        )));
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::memory::InMemoryMatchStore,
        state::{AppState, handshake::ParticipantSlot},
    };

    async fn test_state(window: Duration) -> SharedState {
        let state = AppState::new(AppConfig::with_auto_confirm_window(window));
        state
            .install_match_store(Arc::new(InMemoryMatchStore::new()))
            .await;
        state
    }

    async fn seed_live_match(state: &SharedState) -> (Uuid, Uuid, Uuid) {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let mut entity = MatchEntity::new(Uuid::new_v4(), 1, 1, Some(p1), Some(p2));
        for slot in [ParticipantSlot::One, ParticipantSlot::Two] {
            entity.ready.mark_ready(slot);
            entity.ready.confirm_active(slot).unwrap();
        }
        entity.state = MatchState::Live;
        entity.live_at = Some(SystemTime::now());

        let store = state.require_match_store().await.unwrap();
        store.insert_match(entity.clone()).await.unwrap();
        (entity.id, p1, p2)
    }

    fn report(score1: i64, score2: i64) -> ReportScoreRequest {
        ReportScoreRequest {
            participant1_score: score1,
            participant2_score: score2,
            evidence_ref: None,
        }
    }

    #[tokio::test]
    async fn report_then_confirm_completes_the_match() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, p1, p2) = seed_live_match(&state).await;

        let reported = report_score(&state, match_id, p1, report(3, 1)).await.unwrap();
        assert_eq!(reported.state, MatchState::AwaitingConfirmation);
        assert_eq!(reported.reported_by, Some(p1));
        assert_eq!(reported.winner_id, Some(p1));
        assert!(reported.auto_confirm_at.is_some());
        assert_eq!(state.timers().pending(), 1);

        let confirmed = confirm_score(&state, match_id, p2).await.unwrap();
        assert_eq!(confirmed.state, MatchState::Completed);
        assert_eq!(confirmed.winner_id, Some(p1));
        assert!(confirmed.completed_at.is_some());
        assert_eq!(state.timers().pending(), 0);
    }

    #[tokio::test]
    async fn reporter_cannot_confirm_their_own_report() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, p1, _p2) = seed_live_match(&state).await;

        report_score(&state, match_id, p1, report(2, 0)).await.unwrap();

        let err = confirm_score(&state, match_id, p1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));

        let entity = get_match(&state, match_id).await.unwrap();
        assert_eq!(entity.state, MatchState::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn tied_scores_are_rejected() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, p1, _p2) = seed_live_match(&state).await;

        let err = report_score(&state, match_id, p1, report(2, 2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidScore(_)));

        let entity = get_match(&state, match_id).await.unwrap();
        assert_eq!(entity.state, MatchState::Live);
        assert_eq!(state.timers().pending(), 0);
    }

    #[tokio::test]
    async fn negative_scores_are_rejected() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, _p1, p2) = seed_live_match(&state).await;

        let err = report_score(&state, match_id, p2, report(-1, 3)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidScore(_)));
    }

    #[tokio::test]
    async fn outsiders_cannot_report() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, _p1, _p2) = seed_live_match(&state).await;

        let err = report_score(&state, match_id, Uuid::new_v4(), report(1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotParticipant(_)));
    }

    #[tokio::test]
    async fn reporting_requires_a_live_match() {
        let state = test_state(Duration::from_secs(600)).await;
        let p1 = Uuid::new_v4();
        let entity = MatchEntity::new(Uuid::new_v4(), 1, 1, Some(p1), Some(Uuid::new_v4()));
        let match_id = entity.id;
        let store = state.require_match_store().await.unwrap();
        store.insert_match(entity).await.unwrap();

        let err = report_score(&state, match_id, p1, report(1, 0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn elapsed_window_auto_confirms_the_report() {
        let state = test_state(Duration::from_millis(50)).await;
        let (match_id, p1, _p2) = seed_live_match(&state).await;

        report_score(&state, match_id, p1, report(5, 3)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        let entity = get_match(&state, match_id).await.unwrap();
        assert_eq!(entity.state, MatchState::Completed);
        assert_eq!(entity.winner_id, Some(p1));
        assert!(entity.completed_at.is_some());
        assert_eq!(state.timers().pending(), 0);
    }

    #[tokio::test]
    async fn confirmation_cancels_the_pending_deadline() {
        let state = test_state(Duration::from_millis(200)).await;
        let (match_id, p1, p2) = seed_live_match(&state).await;

        report_score(&state, match_id, p1, report(1, 0)).await.unwrap();
        let confirmed = confirm_score(&state, match_id, p2).await.unwrap();
        let confirmed_at = confirmed.completed_at;
        assert_eq!(state.timers().pending(), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let entity = get_match(&state, match_id).await.unwrap();
        assert_eq!(entity.state, MatchState::Completed);
        assert_eq!(entity.completed_at, confirmed_at);
    }

    #[tokio::test]
    async fn dispute_freezes_the_match_and_opens_a_case() {
        let state = test_state(Duration::from_millis(50)).await;
        let (match_id, p1, p2) = seed_live_match(&state).await;

        report_score(&state, match_id, p1, report(2, 1)).await.unwrap();
        let (case, entity) = dispute(
            &state,
            match_id,
            p2,
            DisputeRequest {
                reason: "opponent reported the wrong score".into(),
                evidence_ref: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(entity.state, MatchState::Disputed);
        assert_eq!(case.raised_by, p2);
        assert_eq!(state.timers().pending(), 0);

        let store = state.require_match_store().await.unwrap();
        let open = store.find_open_dispute_for_match(match_id).await.unwrap();
        assert_eq!(open.map(|d| d.id), Some(case.id));

        // The deadline must not fire into a disputed match.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let entity = get_match(&state, match_id).await.unwrap();
        assert_eq!(entity.state, MatchState::Disputed);
    }

    #[tokio::test]
    async fn reporter_cannot_dispute_their_own_report() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, p1, _p2) = seed_live_match(&state).await;

        report_score(&state, match_id, p1, report(0, 4)).await.unwrap();
        let err = dispute(
            &state,
            match_id,
            p1,
            DisputeRequest {
                reason: "changed my mind".into(),
                evidence_ref: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn completed_match_rejects_further_lifecycle_actions() {
        let state = test_state(Duration::from_secs(600)).await;
        let (match_id, p1, p2) = seed_live_match(&state).await;

        report_score(&state, match_id, p1, report(3, 2)).await.unwrap();
        confirm_score(&state, match_id, p2).await.unwrap();

        let confirm_again = confirm_score(&state, match_id, p2).await.unwrap_err();
        assert!(matches!(confirm_again, ServiceError::InvalidState(_)));

        let dispute_late = dispute(
            &state,
            match_id,
            p2,
            DisputeRequest {
                reason: "too late".into(),
                evidence_ref: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(dispute_late, ServiceError::InvalidState(_)));

        let report_again = report_score(&state, match_id, p1, report(9, 0)).await.unwrap_err();
        assert!(matches!(report_again, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn degraded_mode_rejects_mutations() {
        let state = AppState::new(AppConfig::with_auto_confirm_window(Duration::from_secs(600)));
        let err = report_score(&state, Uuid::new_v4(), Uuid::new_v4(), report(1, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
