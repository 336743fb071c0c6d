use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{Difficulty, MatchRequestEntity, RequestStatus},
    dto::format_system_time,
};

/// Payload used to open a new matchmaking request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRequestInput {
    /// Player opening the request.
    pub requester_id: Uuid,
    /// Display name shown to potential opponents.
    #[validate(length(min = 1, max = 64))]
    pub requester_name: String,
    /// Number of questions for the resulting match.
    #[validate(range(min = 1, max = 50))]
    pub rounds: u32,
    /// Question category filter; "any" matches every category.
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    /// Question difficulty filter.
    pub difficulty: Difficulty,
}

/// Payload used to claim a pending matchmaking request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ClaimRequestInput {
    /// Player attempting the claim.
    pub claimer_id: Uuid,
    /// Display name of the claimer, stored on the match.
    #[validate(length(min = 1, max = 64))]
    pub claimer_name: String,
}

/// Summary of a matchmaking request returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchRequestSummary {
    /// Request identifier.
    pub id: Uuid,
    /// Player who opened the request.
    pub requester_id: Uuid,
    /// Display name of the requester.
    pub requester_name: String,
    /// Number of questions for the resulting match.
    pub rounds: u32,
    /// Category filter.
    pub category: String,
    /// Difficulty filter.
    pub difficulty: Difficulty,
    /// Current lifecycle state.
    pub status: RequestStatus,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Expiry timestamp, RFC 3339.
    pub expires_at: String,
}

impl From<MatchRequestEntity> for MatchRequestSummary {
    fn from(entity: MatchRequestEntity) -> Self {
        Self {
            id: entity.id,
            requester_id: entity.requester_id,
            requester_name: entity.requester_name,
            rounds: entity.rounds,
            category: entity.category,
            difficulty: entity.difficulty,
            status: entity.status,
            created_at: format_system_time(entity.created_at),
            expires_at: format_system_time(entity.expires_at),
        }
    }
}
