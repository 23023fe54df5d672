//! In-memory match store backed by concurrent maps.
//!
//! Source of truth for tests and single-node deployments without a
//! database. Version checks behave exactly like the remote backends so the
//! service-layer retry loop exercises the same paths.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::MatchStore;
use crate::dao::models::{DisputeEntity, DisputeStatus, MatchEntity};
use crate::dao::storage::{StorageError, StorageResult};

/// Process-local [`MatchStore`] implementation.
#[derive(Clone, Default)]
pub struct InMemoryMatchStore {
    inner: Arc<Maps>,
}

#[derive(Default)]
struct Maps {
    matches: DashMap<Uuid, MatchEntity>,
    // (tournament, round, order) -> match id; mirrors the unique slot index
    // of the remote backends.
    slots: DashMap<(Uuid, u32, u32), Uuid>,
    disputes: DashMap<Uuid, DisputeEntity>,
}

impl InMemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_match_sync(&self, entity: MatchEntity) -> StorageResult<()> {
        use dashmap::mapref::entry::Entry;

        // The slot entry is the atomic uniqueness gate: racing sibling
        // completions must not both create the same next-round match. A
        // scan-then-insert would leave a window between the two.
        let slot_key = (entity.tournament_id, entity.round_number, entity.match_order);
        match self.inner.slots.entry(slot_key) {
            Entry::Occupied(_) => Err(StorageError::conflict(format!(
                "bracket slot {}/{} already occupied in tournament {}",
                entity.round_number, entity.match_order, entity.tournament_id
            ))),
            Entry::Vacant(slot) => match self.inner.matches.entry(entity.id) {
                Entry::Occupied(_) => Err(StorageError::conflict(format!(
                    "match {} already exists",
                    entity.id
                ))),
                Entry::Vacant(vacant) => {
                    slot.insert(entity.id);
                    vacant.insert(entity);
                    Ok(())
                }
            },
        }
    }

    fn update_match_sync(&self, mut entity: MatchEntity) -> StorageResult<MatchEntity> {
        let Some(mut stored) = self.inner.matches.get_mut(&entity.id) else {
            return Err(StorageError::conflict(format!(
                "match {} does not exist",
                entity.id
            )));
        };

        if stored.version != entity.version {
            return Err(StorageError::conflict(format!(
                "match {} version {} is stale (stored {})",
                entity.id, entity.version, stored.version
            )));
        }

        entity.version += 1;
        *stored = entity.clone();
        Ok(entity)
    }

    fn resolve_dispute_sync(&self, dispute: DisputeEntity) -> StorageResult<DisputeEntity> {
        let Some(mut stored) = self.inner.disputes.get_mut(&dispute.id) else {
            return Err(StorageError::conflict(format!(
                "dispute {} does not exist",
                dispute.id
            )));
        };

        if stored.status != DisputeStatus::Open {
            return Err(StorageError::conflict(format!(
                "dispute {} is no longer open",
                dispute.id
            )));
        }

        *stored = dispute.clone();
        Ok(dispute)
    }
}

impl MatchStore for InMemoryMatchStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match_sync(entity) })
    }

    fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.update_match_sync(entity) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.matches.get(&id).map(|entry| entry.clone())) })
    }

    fn find_match_slot(
        &self,
        tournament_id: Uuid,
        round_number: u32,
        match_order: u32,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .matches
                .iter()
                .find(|entry| {
                    entry.tournament_id == tournament_id
                        && entry.round_number == round_number
                        && entry.match_order == match_order
                })
                .map(|entry| entry.clone()))
        })
    }

    fn list_matches(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut matches: Vec<MatchEntity> = store
                .inner
                .matches
                .iter()
                .filter(|entry| entry.tournament_id == tournament_id)
                .map(|entry| entry.clone())
                .collect();
            matches.sort_by_key(|entity| (entity.round_number, entity.match_order));
            Ok(matches)
        })
    }

    fn list_round_matches(
        &self,
        tournament_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut matches: Vec<MatchEntity> = store
                .inner
                .matches
                .iter()
                .filter(|entry| {
                    entry.tournament_id == tournament_id && entry.round_number == round_number
                })
                .map(|entry| entry.clone())
                .collect();
            matches.sort_by_key(|entity| entity.match_order);
            Ok(matches)
        })
    }

    fn insert_dispute(&self, dispute: DisputeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            use dashmap::mapref::entry::Entry;
            match store.inner.disputes.entry(dispute.id) {
                Entry::Occupied(_) => Err(StorageError::conflict(format!(
                    "dispute {} already exists",
                    dispute.id
                ))),
                Entry::Vacant(vacant) => {
                    vacant.insert(dispute);
                    Ok(())
                }
            }
        })
    }

    fn resolve_dispute(
        &self,
        dispute: DisputeEntity,
    ) -> BoxFuture<'static, StorageResult<DisputeEntity>> {
        let store = self.clone();
        Box::pin(async move { store.resolve_dispute_sync(dispute) })
    }

    fn find_dispute(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DisputeEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.disputes.get(&id).map(|entry| entry.clone())) })
    }

    fn find_open_dispute_for_match(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<DisputeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .disputes
                .iter()
                .find(|entry| entry.match_id == match_id && entry.status == DisputeStatus::Open)
                .map(|entry| entry.clone()))
        })
    }

    fn list_open_disputes(&self) -> BoxFuture<'static, StorageResult<Vec<DisputeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut disputes: Vec<DisputeEntity> = store
                .inner
                .disputes
                .iter()
                .filter(|entry| entry.status == DisputeStatus::Open)
                .map(|entry| entry.clone())
                .collect();
            disputes.sort_by_key(|dispute| dispute.opened_at);
            Ok(disputes)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match() -> MatchEntity {
        MatchEntity::new(
            Uuid::new_v4(),
            1,
            1,
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
        )
    }

    #[tokio::test]
    async fn update_bumps_version_and_rejects_stale_writers() {
        let store = InMemoryMatchStore::new();
        let entity = sample_match();
        store.insert_match(entity.clone()).await.unwrap();

        let first = store.update_match(entity.clone()).await.unwrap();
        assert_eq!(first.version, 1);

        // Second writer still holds version 0.
        let err = store.update_match(entity).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn duplicate_bracket_slot_is_rejected() {
        let store = InMemoryMatchStore::new();
        let entity = sample_match();
        store.insert_match(entity.clone()).await.unwrap();

        let twin = MatchEntity::new(
            entity.tournament_id,
            entity.round_number,
            entity.match_order,
            None,
            None,
        );
        let err = store.insert_match(twin).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn resolve_dispute_is_single_shot() {
        let store = InMemoryMatchStore::new();
        let dispute = DisputeEntity::open(Uuid::new_v4(), Uuid::new_v4(), "bad score".into(), None);
        store.insert_dispute(dispute.clone()).await.unwrap();

        let mut resolved = dispute.clone();
        resolved.status = DisputeStatus::Resolved;
        store.resolve_dispute(resolved.clone()).await.unwrap();

        let err = store.resolve_dispute(resolved).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_slot_inserts_admit_exactly_one() {
        let store = InMemoryMatchStore::new();
        let tournament_id = Uuid::new_v4();

        for order in 1..=32u32 {
            let barrier = Arc::new(tokio::sync::Barrier::new(2));
            let mut tasks = Vec::new();
            for _ in 0..2 {
                let store = store.clone();
                let barrier = barrier.clone();
                tasks.push(tokio::spawn(async move {
                    let entity =
                        MatchEntity::new(tournament_id, 2, order, Some(Uuid::new_v4()), None);
                    barrier.wait().await;
                    store.insert_match(entity).await
                }));
            }

            let mut admitted = 0;
            for task in tasks {
                if task.await.unwrap().is_ok() {
                    admitted += 1;
                }
            }
            assert_eq!(admitted, 1);

            let survivors = store
                .list_round_matches(tournament_id, 2)
                .await
                .unwrap()
                .into_iter()
                .filter(|entity| entity.match_order == order)
                .count();
            assert_eq!(survivors, 1);
        }
    }

    #[tokio::test]
    async fn round_listing_is_ordered() {
        let store = InMemoryMatchStore::new();
        let tournament_id = Uuid::new_v4();
        for order in [2u32, 1, 3] {
            store
                .insert_match(MatchEntity::new(tournament_id, 1, order, None, None))
                .await
                .unwrap();
        }

        let round = store.list_round_matches(tournament_id, 1).await.unwrap();
        let orders: Vec<u32> = round.iter().map(|m| m.match_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }
}
