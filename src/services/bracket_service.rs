//! Single-elimination bracket seeding and winner propagation.
//!
//! Bracket geometry is positional: the winners of round `r` matches
//! `2k - 1` and `2k` meet in round `r + 1` match `k`, the earlier
//! completion taking the first unfilled slot. A completed match whose
//! round holds no sibling is the final.

use std::{collections::HashSet, sync::Arc};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{match_store::MatchStore, models::MatchEntity, storage::StorageError},
    error::ServiceError,
    services::{
        match_service::{advance, commit_match},
        notify::NotificationEvent,
    },
    state::{SharedState, match_machine::MatchEvent},
};

/// Propagate a completed match's winner into the next round.
///
/// Idempotent: replaying the same completion finds the slot already filled
/// with the same winner and changes nothing.
pub async fn on_match_completed(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    completed: &MatchEntity,
) -> Result<(), ServiceError> {
    let winner_id = completed.winner_id.ok_or_else(|| {
        ServiceError::InvalidState(format!(
            "match `{}` completed without a winner",
            completed.id
        ))
    })?;

    let round = store
        .list_round_matches(completed.tournament_id, completed.round_number)
        .await?;
    if round.len() <= 1 {
        info!(
            tournament_id = %completed.tournament_id,
            winner = %winner_id,
            "final match completed; tournament finished"
        );
        state.notifier().dispatch(NotificationEvent::TournamentCompleted {
            tournament_id: completed.tournament_id,
            winner_id,
        });
        return Ok(());
    }

    let next_round = completed.round_number + 1;
    let next_order = completed.match_order.div_ceil(2);

    if let Some(existing) = store
        .find_match_slot(completed.tournament_id, next_round, next_order)
        .await?
    {
        return fill_slot(state, store, existing.id, winner_id).await;
    }

    let entity = MatchEntity::new(
        completed.tournament_id,
        next_round,
        next_order,
        Some(winner_id),
        None,
    );

    match store.insert_match(entity.clone()).await {
        Ok(()) => {
            info!(
                match_id = %entity.id,
                round = next_round,
                order = next_order,
                winner = %winner_id,
                "advanced winner into a new next-round match"
            );
            Ok(())
        }
        Err(StorageError::Conflict { .. }) => {
            // The sibling match created the slot first.
            let existing = store
                .find_match_slot(completed.tournament_id, next_round, next_order)
                .await?
                .ok_or_else(|| {
                    ServiceError::ConcurrencyConflict(format!(
                        "next-round slot ({next_round}, {next_order}) vanished during advancement"
                    ))
                })?;
            fill_slot(state, store, existing.id, winner_id).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn fill_slot(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    match_id: Uuid,
    winner_id: Uuid,
) -> Result<(), ServiceError> {
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    commit_match(state, store, match_id, |entity| {
        // Replayed completion: the winner already occupies a slot.
        if entity.is_participant(winner_id) {
            return Ok(());
        }
        if entity.participant1_id.is_none() {
            entity.participant1_id = Some(winner_id);
        } else if entity.participant2_id.is_none() {
            entity.participant2_id = Some(winner_id);
        } else {
            return Err(ServiceError::ConcurrencyConflict(format!(
                "both slots of match `{match_id}` are already taken"
            )));
        }
        Ok(())
    })
    .await?;

    info!(%match_id, winner = %winner_id, "advanced winner into an existing next-round match");
    Ok(())
}

/// Seed round 1 of a tournament by pairing adjacent participants.
pub async fn create_bracket(
    state: &SharedState,
    tournament_id: Option<Uuid>,
    participants: &[Uuid],
) -> Result<(Uuid, Vec<MatchEntity>), ServiceError> {
    if participants.len() < 2 || participants.len() % 2 != 0 {
        return Err(ServiceError::InvalidInput(
            "participant list must have an even length of at least 2".into(),
        ));
    }
    let unique: HashSet<&Uuid> = participants.iter().collect();
    if unique.len() != participants.len() {
        return Err(ServiceError::InvalidInput(
            "participant list contains duplicates".into(),
        ));
    }

    let store = state.require_match_store().await?;
    let tournament_id = tournament_id.unwrap_or_else(Uuid::new_v4);
    if !store.list_matches(tournament_id).await?.is_empty() {
        return Err(ServiceError::InvalidState(format!(
            "tournament `{tournament_id}` already has a bracket"
        )));
    }

    let mut created = Vec::with_capacity(participants.len() / 2);
    for (index, pair) in participants.chunks(2).enumerate() {
        let entity = MatchEntity::new(
            tournament_id,
            1,
            index as u32 + 1,
            Some(pair[0]),
            Some(pair[1]),
        );
        store.insert_match(entity.clone()).await?;
        created.push(entity);
    }

    info!(%tournament_id, matches = created.len(), "seeded round 1 of tournament");
    Ok((tournament_id, created))
}

/// Cancel a match that has not gone live.
pub async fn cancel_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    let lock = state.match_lock(match_id);
    let _guard = lock.lock().await;

    let (entity, _) = commit_match(state, &store, match_id, |entity| {
        advance(entity, MatchEvent::Cancel)
    })
    .await?;

    state.timers().cancel(match_id);
    info!(%match_id, "match cancelled");
    Ok(entity)
}
