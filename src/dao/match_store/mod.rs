pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{DisputeEntity, MatchEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for matches and disputes.
///
/// `update_match` is a compare-and-swap: the passed entity carries the
/// version the caller read, the store persists it with the version bumped
/// only if the stored version still matches, and returns the stored entity.
/// `resolve_dispute` likewise only succeeds while the stored dispute is
/// still open. Both report a lost race as [`StorageError::Conflict`].
///
/// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
pub trait MatchStore: Send + Sync {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn find_match_slot(
        &self,
        tournament_id: Uuid,
        round_number: u32,
        match_order: u32,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn list_matches(&self, tournament_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn list_round_matches(
        &self,
        tournament_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn insert_dispute(&self, dispute: DisputeEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn resolve_dispute(
        &self,
        dispute: DisputeEntity,
    ) -> BoxFuture<'static, StorageResult<DisputeEntity>>;
    fn find_dispute(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DisputeEntity>>>;
    fn find_open_dispute_for_match(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<DisputeEntity>>>;
    fn list_open_disputes(&self) -> BoxFuture<'static, StorageResult<Vec<DisputeEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
