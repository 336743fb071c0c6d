use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name, when the payload is typed.
    pub event: Option<String>,
    /// Serialized JSON body.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`lobby` or a match id).
    pub stream: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a matchmaking request has been claimed and a match created.
pub struct MatchAcceptedEvent {
    /// The request that was claimed.
    pub request_id: Uuid,
    /// The match created from it.
    pub match_id: Uuid,
    /// Winning claimer.
    pub accepter_id: Uuid,
    /// Winning claimer's display name.
    pub accepter_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a player opens the current question. A hint only.
pub struct QuestionStartedEvent {
    /// Match concerned.
    pub match_id: Uuid,
    /// Player who opened the question.
    pub player_id: Uuid,
    /// Index of the opened question.
    pub question_index: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when an answer fact has been recorded.
pub struct AnswerSubmittedEvent {
    /// Match concerned.
    pub match_id: Uuid,
    /// Player who answered.
    pub player_id: Uuid,
    /// Index of the answered question.
    pub question_index: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after an advance attempt once both players answered a question
/// (or a timeout forfeited it). Consumers re-reconcile; no payload field is
/// authoritative.
pub struct BothAnsweredEvent {
    /// Match concerned.
    pub match_id: Uuid,
    /// The question that was settled.
    pub question_index: u32,
    /// Shared pointer after advancement.
    pub next_question: u32,
    /// Whether the match finished as a result.
    pub finished: bool,
}
