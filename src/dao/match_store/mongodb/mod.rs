mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoMatchStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::StaleWrite { what, id } => {
                StorageError::conflict(format!("{what} {id} changed concurrently"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
