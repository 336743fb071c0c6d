use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Duel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matchmaking::create_request,
        crate::routes::matchmaking::list_requests,
        crate::routes::matchmaking::claim_request,
        crate::routes::matchmaking::cancel_request,
        crate::routes::matches::get_match,
        crate::routes::matches::record_answer,
        crate::routes::matches::question_opened,
        crate::routes::sse::lobby_stream,
        crate::routes::sse::match_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matchmaking::CreateRequestInput,
            crate::dto::matchmaking::ClaimRequestInput,
            crate::dto::matchmaking::MatchRequestSummary,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::PlayerProgress,
            crate::dto::matches::QuestionView,
            crate::dto::matches::RecordAnswerInput,
            crate::dto::matches::RecordAnswerResponse,
            crate::dto::matches::QuestionOpenedInput,
            crate::dto::sse::Handshake,
            crate::dto::sse::MatchAcceptedEvent,
            crate::dto::sse::QuestionStartedEvent,
            crate::dto::sse::AnswerSubmittedEvent,
            crate::dto::sse::BothAnsweredEvent,
            crate::dao::models::Difficulty,
            crate::dao::models::MatchStatus,
            crate::dao::models::RequestStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matchmaking", description = "Matchmaking request lifecycle"),
        (name = "matches", description = "Match state and answer recording"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
