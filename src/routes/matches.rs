use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::matches::{MatchSummary, QuestionOpenedInput, RecordAnswerInput, RecordAnswerResponse},
    error::AppError,
    services::answer_service,
    state::SharedState,
};

/// Routes handling match reads, answer submission, and question-open hints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/answers", post(record_answer))
        .route("/matches/{id}/opened", post(question_opened))
}

/// Read a match with progress derived from the answer log.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match summary", body = MatchSummary),
        (status = 404, description = "Match does not exist")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let summary = answer_service::get_match(&state, id).await?;
    Ok(Json(summary))
}

/// Record an answer to the current question of a match.
#[utoipa::path(
    post,
    path = "/matches/{id}/answers",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = RecordAnswerInput,
    responses(
        (status = 200, description = "Answer processed", body = RecordAnswerResponse),
        (status = 400, description = "Invalid answer payload"),
        (status = 404, description = "Match does not exist"),
        (status = 409, description = "Question is not open for answers")
    )
)]
pub async fn record_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordAnswerInput>,
) -> Result<Json<RecordAnswerResponse>, AppError> {
    let response = answer_service::record_answer(&state, id, payload).await?;
    Ok(Json(response))
}

/// Note that a player opened the current question.
#[utoipa::path(
    post,
    path = "/matches/{id}/opened",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = QuestionOpenedInput,
    responses(
        (status = 204, description = "Hint published"),
        (status = 404, description = "Match does not exist")
    )
)]
pub async fn question_opened(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QuestionOpenedInput>,
) -> Result<axum::http::StatusCode, AppError> {
    answer_service::note_question_opened(&state, id, payload).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
