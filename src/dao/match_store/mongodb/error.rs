use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures specific to the MongoDB backend, annotated with the record they
/// concern so operators can trace lost writes.
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
    #[error("failed to save matchmaking request `{id}`")]
    SaveRequest {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load matchmaking request `{id}`")]
    LoadRequest {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list matchmaking requests")]
    ListRequests {
        #[source]
        source: MongoError,
    },
    #[error("failed to update matchmaking request `{id}`")]
    UpdateRequest {
        id: Uuid,
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
    #[error("failed to update match `{id}`")]
    UpdateMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save answer for match `{match_id}`")]
    SaveAnswer {
        match_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load answers for match `{match_id}`")]
    LoadAnswers {
        match_id: Uuid,
        #[source]
        source: MongoError,
    },
}
