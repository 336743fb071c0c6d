use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        matches::MatchSummary,
        matchmaking::{ClaimRequestInput, CreateRequestInput, MatchRequestSummary},
    },
    error::AppError,
    services::matchmaking_service,
    state::SharedState,
};

/// Routes handling matchmaking request lifecycle and the claim race.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/{id}/claim", post(claim_request))
        .route("/requests/{id}", delete(cancel_request))
}

/// Open a new matchmaking request.
#[utoipa::path(
    post,
    path = "/requests",
    tag = "matchmaking",
    request_body = CreateRequestInput,
    responses(
        (status = 200, description = "Request created", body = MatchRequestSummary),
        (status = 400, description = "Invalid request payload")
    )
)]
pub async fn create_request(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRequestInput>,
) -> Result<Json<MatchRequestSummary>, AppError> {
    payload.validate()?;
    let summary = matchmaking_service::create_request(&state, payload).await?;
    Ok(Json(summary))
}

/// List requests that are currently claimable.
#[utoipa::path(
    get,
    path = "/requests",
    tag = "matchmaking",
    responses(
        (status = 200, description = "Pending requests", body = [MatchRequestSummary])
    )
)]
pub async fn list_requests(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchRequestSummary>>, AppError> {
    let summaries = matchmaking_service::list_requests(&state).await?;
    Ok(Json(summaries))
}

/// Claim a pending request; exactly one claimer succeeds.
#[utoipa::path(
    post,
    path = "/requests/{id}/claim",
    tag = "matchmaking",
    params(("id" = String, Path, description = "Identifier of the request to claim")),
    request_body = ClaimRequestInput,
    responses(
        (status = 200, description = "Request claimed; match created", body = MatchSummary),
        (status = 404, description = "Request does not exist"),
        (status = 409, description = "Request already claimed or no longer pending")
    )
)]
pub async fn claim_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClaimRequestInput>,
) -> Result<Json<MatchSummary>, AppError> {
    payload.validate()?;
    let summary = matchmaking_service::claim_request(&state, id, payload).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize, IntoParams)]
/// Query parameters identifying the caller of a cancellation.
pub struct CancelRequestParams {
    /// Player who opened the request.
    pub requester_id: Uuid,
}

/// Cancel a pending request. Only its requester may do so.
#[utoipa::path(
    delete,
    path = "/requests/{id}",
    tag = "matchmaking",
    params(
        ("id" = String, Path, description = "Identifier of the request to cancel"),
        CancelRequestParams
    ),
    responses(
        (status = 204, description = "Request cancelled"),
        (status = 404, description = "Request does not exist"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn cancel_request(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CancelRequestParams>,
) -> Result<axum::http::StatusCode, AppError> {
    matchmaking_service::cancel_request(&state, id, params.requester_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
