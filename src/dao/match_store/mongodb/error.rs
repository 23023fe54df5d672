use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save match `{id}`")]
    SaveMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load match `{id}`")]
    LoadMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query matches")]
    QueryMatches {
        #[source]
        source: MongoError,
    },
    #[error("failed to save dispute `{id}`")]
    SaveDispute {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load dispute `{id}`")]
    LoadDispute {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query disputes")]
    QueryDisputes {
        #[source]
        source: MongoError,
    },
    #[error("stale write on `{what}` `{id}`: precondition no longer holds")]
    StaleWrite { what: &'static str, id: Uuid },
}
