use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoDisputeDocument, MongoMatchDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    match_store::MatchStore,
    models::{DisputeEntity, MatchEntity},
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "matches";
const DISPUTE_COLLECTION_NAME: &str = "disputes";

/// MongoDB-backed [`MatchStore`].
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection from a MongoDB URI and optional database name.
    pub async fn connect_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let config = MongoConfig::from_uri(uri, db_name).await?;
        Self::connect(config).await
    }

    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // Unique bracket slot so a racing sibling completion cannot create
        // the next-round match twice.
        let match_collection = database.collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME);
        let slot_index = mongodb::IndexModel::builder()
            .keys(doc! {"tournament_id": 1, "round_number": 1, "match_order": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_slot_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        match_collection
            .create_index(slot_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "tournament_id,round_number,match_order",
                source,
            })?;

        let dispute_collection =
            database.collection::<MongoDisputeDocument>(DISPUTE_COLLECTION_NAME);
        let status_index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "match_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("dispute_status_idx".to_owned()))
                    .build(),
            )
            .build();

        dispute_collection
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: DISPUTE_COLLECTION_NAME,
                index: "status,match_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn match_collection(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn dispute_collection(&self) -> Collection<MongoDisputeDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoDisputeDocument>(DISPUTE_COLLECTION_NAME)
    }

    async fn insert_match(&self, entity: MatchEntity) -> MongoResult<()> {
        let id = entity.id;
        let document: MongoMatchDocument = entity.into();
        let collection = self.match_collection().await;
        collection.insert_one(&document).await.map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::StaleWrite { what: "match", id }
            } else {
                MongoDaoError::SaveMatch { id, source }
            }
        })?;
        Ok(())
    }

    async fn update_match(&self, mut entity: MatchEntity) -> MongoResult<MatchEntity> {
        let id = entity.id;
        let expected_version = entity.version as i64;
        entity.version += 1;

        let document: MongoMatchDocument = entity.clone().into();
        let collection = self.match_collection().await;
        let result = collection
            .replace_one(
                doc! { "_id": uuid_as_binary(id), "version": expected_version },
                &document,
            )
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::StaleWrite { what: "match", id });
        }

        Ok(entity)
    }

    async fn find_match(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        let collection = self.match_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_match_slot(
        &self,
        tournament_id: Uuid,
        round_number: u32,
        match_order: u32,
    ) -> MongoResult<Option<MatchEntity>> {
        let collection = self.match_collection().await;
        let document = collection
            .find_one(doc! {
                "tournament_id": uuid_as_binary(tournament_id),
                "round_number": round_number as i64,
                "match_order": match_order as i64,
            })
            .await
            .map_err(|source| MongoDaoError::QueryMatches { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_matches(&self, tournament_id: Uuid) -> MongoResult<Vec<MatchEntity>> {
        let collection = self.match_collection().await;
        let documents: Vec<MongoMatchDocument> = collection
            .find(doc! { "tournament_id": uuid_as_binary(tournament_id) })
            .sort(doc! { "round_number": 1, "match_order": 1 })
            .await
            .map_err(|source| MongoDaoError::QueryMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryMatches { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn list_round_matches(
        &self,
        tournament_id: Uuid,
        round_number: u32,
    ) -> MongoResult<Vec<MatchEntity>> {
        let collection = self.match_collection().await;
        let documents: Vec<MongoMatchDocument> = collection
            .find(doc! {
                "tournament_id": uuid_as_binary(tournament_id),
                "round_number": round_number as i64,
            })
            .sort(doc! { "match_order": 1 })
            .await
            .map_err(|source| MongoDaoError::QueryMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryMatches { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_dispute(&self, dispute: DisputeEntity) -> MongoResult<()> {
        let id = dispute.id;
        let document: MongoDisputeDocument = dispute.into();
        let collection = self.dispute_collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveDispute { id, source })?;
        Ok(())
    }

    async fn resolve_dispute(&self, dispute: DisputeEntity) -> MongoResult<DisputeEntity> {
        let id = dispute.id;
        let document: MongoDisputeDocument = dispute.clone().into();
        let collection = self.dispute_collection().await;
        let result = collection
            .replace_one(
                doc! { "_id": uuid_as_binary(id), "status": "open" },
                &document,
            )
            .await
            .map_err(|source| MongoDaoError::SaveDispute { id, source })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::StaleWrite {
                what: "dispute",
                id,
            });
        }

        Ok(dispute)
    }

    async fn find_dispute(&self, id: Uuid) -> MongoResult<Option<DisputeEntity>> {
        let collection = self.dispute_collection().await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadDispute { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_open_dispute_for_match(
        &self,
        match_id: Uuid,
    ) -> MongoResult<Option<DisputeEntity>> {
        let collection = self.dispute_collection().await;
        let document = collection
            .find_one(doc! { "match_id": uuid_as_binary(match_id), "status": "open" })
            .await
            .map_err(|source| MongoDaoError::QueryDisputes { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_open_disputes(&self) -> MongoResult<Vec<DisputeEntity>> {
        let collection = self.dispute_collection().await;
        let documents: Vec<MongoDisputeDocument> = collection
            .find(doc! { "status": "open" })
            .sort(doc! { "opened_at": 1 })
            .await
            .map_err(|source| MongoDaoError::QueryDisputes { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryDisputes { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11000
    )
}

impl MatchStore for MongoMatchStore {
    fn insert_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match(entity).await.map_err(Into::into) })
    }

    fn update_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.update_match(entity).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn find_match_slot(
        &self,
        tournament_id: Uuid,
        round_number: u32,
        match_order: u32,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_match_slot(tournament_id, round_number, match_order)
                .await
                .map_err(Into::into)
        })
    }

    fn list_matches(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(tournament_id).await.map_err(Into::into) })
    }

    fn list_round_matches(
        &self,
        tournament_id: Uuid,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_round_matches(tournament_id, round_number)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_dispute(&self, dispute: DisputeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_dispute(dispute).await.map_err(Into::into) })
    }

    fn resolve_dispute(
        &self,
        dispute: DisputeEntity,
    ) -> BoxFuture<'static, StorageResult<DisputeEntity>> {
        let store = self.clone();
        Box::pin(async move { store.resolve_dispute(dispute).await.map_err(Into::into) })
    }

    fn find_dispute(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<DisputeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_dispute(id).await.map_err(Into::into) })
    }

    fn find_open_dispute_for_match(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<DisputeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_open_dispute_for_match(match_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_open_disputes(&self) -> BoxFuture<'static, StorageResult<Vec<DisputeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_open_disputes().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
