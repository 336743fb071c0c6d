//! MongoDB backend for the match store. Conditional updates are filtered
//! `update_one` calls; the answer uniqueness key is a unique compound index.

mod error;
mod models;
/// Store implementation over the three match collections.
pub mod store;

/// Connection configuration for the MongoDB backend.
pub mod config;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoMatchStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
