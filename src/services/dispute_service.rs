//! Admin arbitration over disputed score reports.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        models::{DisputeEntity, DisputeStatus, MatchEntity, MatchState},
        storage::StorageError,
    },
    dto::admin::ResolveDisputeRequest,
    error::ServiceError,
    services::{
        match_service::{self, advance, commit_match},
        notify::NotificationEvent,
    },
    state::{SharedState, match_machine::MatchEvent},
};

/// List every open dispute joined with its match.
pub async fn list_open(
    state: &SharedState,
) -> Result<Vec<(DisputeEntity, MatchEntity)>, ServiceError> {
    let store = state.require_match_store().await?;
    let disputes = store.list_open_disputes().await?;

    let mut joined = Vec::with_capacity(disputes.len());
    for dispute in disputes {
        match store.find_match(dispute.match_id).await? {
            Some(entity) => joined.push((dispute, entity)),
            None => warn!(
                dispute_id = %dispute.id,
                match_id = %dispute.match_id,
                "open dispute references a missing match"
            ),
        }
    }
    Ok(joined)
}

/// Fetch one dispute joined with its match.
pub async fn get_dispute(
    state: &SharedState,
    dispute_id: Uuid,
) -> Result<(DisputeEntity, MatchEntity), ServiceError> {
    let store = state.require_match_store().await?;
    let dispute = store
        .find_dispute(dispute_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("dispute `{dispute_id}` not found")))?;
    let entity = match_service::load_match(&store, dispute.match_id).await?;
    Ok((dispute, entity))
}

/// Close a dispute with an admin-decided winner.
///
/// The dispute is closed first through its open-status check, so exactly one
/// of two racing admins wins; the loser sees the case as already resolved.
/// Only then is the match completed and its winner advanced.
pub async fn resolve(
    state: &SharedState,
    dispute_id: Uuid,
    admin_id: Uuid,
    request: ResolveDisputeRequest,
) -> Result<(DisputeEntity, MatchEntity), ServiceError> {
    request.validate()?;

    let store = state.require_match_store().await?;
    let dispute = store
        .find_dispute(dispute_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("dispute `{dispute_id}` not found")))?;

    let match_id = dispute.match_id;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    // Re-read under the lock: a racing admin may have closed the case while
    // this one waited.
    let dispute = store
        .find_dispute(dispute_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("dispute `{dispute_id}` not found")))?;
    if dispute.status == DisputeStatus::Resolved {
        return Err(ServiceError::AlreadyResolved(format!(
            "dispute `{dispute_id}` is already resolved"
        )));
    }

    // Validate the decision before touching either record, so a bad winner
    // leaves the match disputed and the case open.
    let current = match_service::load_match(&store, match_id).await?;
    if current.state != MatchState::Disputed {
        return Err(ServiceError::InvalidState(format!(
            "match `{match_id}` is not disputed"
        )));
    }
    if !current.is_participant(request.winner_id) {
        return Err(ServiceError::InvalidWinner(format!(
            "user `{}` is not a participant of match `{match_id}`",
            request.winner_id
        )));
    }

    let mut resolved = dispute;
    resolved.status = DisputeStatus::Resolved;
    resolved.resolution = Some(request.resolution.clone());
    resolved.resolved_by = Some(admin_id);
    resolved.resolved_winner_id = Some(request.winner_id);
    resolved.resolved_at = Some(SystemTime::now());

    let resolved = store.resolve_dispute(resolved).await.map_err(|err| match err {
        StorageError::Conflict { .. } => ServiceError::AlreadyResolved(format!(
            "dispute `{dispute_id}` is already resolved"
        )),
        other => other.into(),
    })?;

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        advance(entity, MatchEvent::DisputeResolved)?;
        entity.winner_id = Some(request.winner_id);
        entity.completed_at = Some(SystemTime::now());
        Ok(())
    })
    .await?;

    state.notifier().dispatch(NotificationEvent::DisputeResolved {
        match_id,
        dispute_id,
        winner_id: request.winner_id,
    });
    info!(
        %dispute_id,
        %match_id,
        admin = %admin_id,
        winner = %request.winner_id,
        "dispute resolved; match completed"
    );
    match_service::finalize_completion(state, &store, &entity).await;

    Ok((resolved, entity))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::memory::InMemoryMatchStore,
        dto::matches::{DisputeRequest, ReportScoreRequest},
        state::{AppState, handshake::ParticipantSlot},
    };

    async fn disputed_match(state: &SharedState) -> (Uuid, Uuid, Uuid, Uuid) {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let mut entity = MatchEntity::new(Uuid::new_v4(), 1, 1, Some(p1), Some(p2));
        for slot in [ParticipantSlot::One, ParticipantSlot::Two] {
            entity.ready.mark_ready(slot);
            entity.ready.confirm_active(slot).unwrap();
        }
        entity.state = MatchState::Live;
        let match_id = entity.id;

        let store = state.require_match_store().await.unwrap();
        store.insert_match(entity).await.unwrap();

        match_service::report_score(
            state,
            match_id,
            p1,
            ReportScoreRequest {
                participant1_score: 3,
                participant2_score: 1,
                evidence_ref: None,
            },
        )
        .await
        .unwrap();
        let (case, _) = match_service::dispute(
            state,
            match_id,
            p2,
            DisputeRequest {
                reason: "the reported score is wrong".into(),
                evidence_ref: None,
            },
        )
        .await
        .unwrap();

        (match_id, case.id, p1, p2)
    }

    async fn test_state() -> SharedState {
        let state = AppState::new(AppConfig::with_auto_confirm_window(Duration::from_secs(600)));
        state
            .install_match_store(Arc::new(InMemoryMatchStore::new()))
            .await;
        state
    }

    fn decision(winner_id: Uuid) -> ResolveDisputeRequest {
        ResolveDisputeRequest {
            winner_id,
            resolution: "reviewed the submitted evidence".into(),
        }
    }

    #[tokio::test]
    async fn resolution_overrides_the_reported_winner() {
        let state = test_state().await;
        let (match_id, dispute_id, p1, p2) = disputed_match(&state).await;
        let admin = Uuid::new_v4();

        let (case, entity) = resolve(&state, dispute_id, admin, decision(p2)).await.unwrap();

        assert_eq!(entity.state, MatchState::Completed);
        assert_eq!(entity.winner_id, Some(p2), "admin decision beats report");
        assert_ne!(entity.winner_id, Some(p1));
        assert_eq!(entity.id, match_id);

        assert_eq!(case.status, DisputeStatus::Resolved);
        assert_eq!(case.resolved_by, Some(admin));
        assert_eq!(case.resolved_winner_id, Some(p2));
        assert!(case.resolved_at.is_some());
    }

    #[tokio::test]
    async fn invalid_winner_leaves_the_dispute_open() {
        let state = test_state().await;
        let (match_id, dispute_id, _p1, _p2) = disputed_match(&state).await;

        let err = resolve(&state, dispute_id, Uuid::new_v4(), decision(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidWinner(_)));

        let (case, entity) = get_dispute(&state, dispute_id).await.unwrap();
        assert_eq!(case.status, DisputeStatus::Open);
        assert_eq!(entity.state, MatchState::Disputed);
        assert_eq!(entity.id, match_id);
    }

    #[tokio::test]
    async fn second_resolution_is_rejected() {
        let state = test_state().await;
        let (_match_id, dispute_id, p1, p2) = disputed_match(&state).await;
        let admin = Uuid::new_v4();

        resolve(&state, dispute_id, admin, decision(p1)).await.unwrap();

        let err = resolve(&state, dispute_id, admin, decision(p2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyResolved(_)));

        let (_, entity) = get_dispute(&state, dispute_id).await.unwrap();
        assert_eq!(entity.winner_id, Some(p1), "first decision stands");
    }

    #[tokio::test]
    async fn racing_admins_resolve_exactly_once() {
        let state = test_state().await;
        let (_match_id, dispute_id, p1, p2) = disputed_match(&state).await;

        let (a, b) = tokio::join!(
            resolve(&state, dispute_id, Uuid::new_v4(), decision(p1)),
            resolve(&state, dispute_id, Uuid::new_v4(), decision(p2)),
        );

        let failures = [&a, &b].iter().filter(|outcome| outcome.is_err()).count();
        assert_eq!(failures, 1, "exactly one admin decision wins");
        let err = if a.is_err() {
            a.unwrap_err()
        } else {
            b.unwrap_err()
        };
        assert!(matches!(err, ServiceError::AlreadyResolved(_)));

        let (case, entity) = get_dispute(&state, dispute_id).await.unwrap();
        assert_eq!(case.status, DisputeStatus::Resolved);
        assert_eq!(entity.state, MatchState::Completed);
        assert_eq!(entity.winner_id, case.resolved_winner_id);
    }

    #[tokio::test]
    async fn empty_resolution_text_is_rejected() {
        let state = test_state().await;
        let (_match_id, dispute_id, p1, _p2) = disputed_match(&state).await;

        let err = resolve(
            &state,
            dispute_id,
            Uuid::new_v4(),
            ResolveDisputeRequest {
                winner_id: p1,
                resolution: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn open_disputes_are_listed_with_their_matches() {
        let state = test_state().await;
        let (match_id, dispute_id, p1, _p2) = disputed_match(&state).await;

        let open = list_open(&state).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].0.id, dispute_id);
        assert_eq!(open[0].1.id, match_id);

        resolve(&state, dispute_id, Uuid::new_v4(), decision(p1))
            .await
            .unwrap();
        assert!(list_open(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolution_advances_the_winner() {
        let state = test_state().await;
        let tournament_id = Uuid::new_v4();
        let store = state.require_match_store().await.unwrap();

        // Two-round bracket: the disputed match feeds round 2.
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let mut first = MatchEntity::new(tournament_id, 1, 1, Some(p1), Some(p2));
        first.state = MatchState::Live;
        for slot in [ParticipantSlot::One, ParticipantSlot::Two] {
            first.ready.mark_ready(slot);
            first.ready.confirm_active(slot).unwrap();
        }
        let sibling = MatchEntity::new(
            tournament_id,
            1,
            2,
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
        );
        let first_id = first.id;
        store.insert_match(first).await.unwrap();
        store.insert_match(sibling).await.unwrap();

        match_service::report_score(
            &state,
            first_id,
            p1,
            ReportScoreRequest {
                participant1_score: 1,
                participant2_score: 0,
                evidence_ref: None,
            },
        )
        .await
        .unwrap();
        let (case, _) = match_service::dispute(
            &state,
            first_id,
            p2,
            DisputeRequest {
                reason: "wrong score".into(),
                evidence_ref: None,
            },
        )
        .await
        .unwrap();

        resolve(&state, case.id, Uuid::new_v4(), decision(p2)).await.unwrap();

        let next = store
            .find_match_slot(tournament_id, 2, 1)
            .await
            .unwrap()
            .expect("round 2 match must exist");
        assert_eq!(next.participant1_id, Some(p2));
    }
}
