use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/events", get(lobby_stream))
        .route("/matches/{id}/events", get(match_stream))
}

#[utoipa::path(
    get,
    path = "/events",
    tag = "sse",
    responses((status = 200, description = "Lobby SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream lobby-wide matchmaking events to connected clients.
pub async fn lobby_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_lobby(&state);
    let degraded = state.is_degraded().await;
    info!("new lobby SSE connection");
    sse_service::to_sse_stream(receiver, StreamKind::Lobby, degraded)
}

#[utoipa::path(
    get,
    path = "/matches/{id}/events",
    tag = "sse",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses((status = 200, description = "Match SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream the realtime events of one match.
pub async fn match_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_match(&state, id);
    let degraded = state.is_degraded().await;
    info!(match_id = %id, "new match SSE connection");
    sse_service::to_sse_stream(receiver, StreamKind::Match(id), degraded)
}
