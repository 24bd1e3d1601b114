mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoPromptStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::MalformedId { collection, value } => {
                StorageError::corrupted(collection, format!("malformed id `{value}`"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
