use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{Difficulty, MatchEntity, MatchStatus, QuestionEntity},
    dto::format_system_time,
    services::progress::ProgressSnapshot,
};

/// Deck entry as shown to players. The correct choice stays server-side so
/// grading cannot be read off the wire.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionView {
    /// Question text.
    pub prompt: String,
    /// Answer choices.
    pub choices: Vec<String>,
    /// Category of the question.
    pub category: String,
    /// Difficulty tier.
    pub difficulty: Difficulty,
}

impl From<&QuestionEntity> for QuestionView {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            prompt: question.prompt.clone(),
            choices: question.choices.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty,
        }
    }
}

/// Per-player progress derived from the answer log.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerProgress {
    /// Player identifier.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Next deck index this player should answer; equals `rounds` when done.
    pub next_question: u32,
    /// Whether this player has answered the current shared question.
    pub answered_current: bool,
    /// Score derived by grading the player's answers against the deck.
    pub score: u32,
}

/// Full match view returned by `GET /matches/{id}`.
///
/// Every progress field here is recomputed from the answer log on read, not
/// copied from the cached columns.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Match identifier.
    pub id: Uuid,
    /// Number of questions.
    pub rounds: u32,
    /// Deck category.
    pub category: String,
    /// Deck difficulty.
    pub difficulty: Difficulty,
    /// Current lifecycle state.
    pub status: MatchStatus,
    /// Shared question pointer after reconciliation.
    pub current_question: u32,
    /// Player whose answer is awaited, when exactly one is missing.
    pub current_turn_player_id: Option<Uuid>,
    /// Instant the current question window opened, RFC 3339.
    pub question_started_at: String,
    /// Instant the current question window closes, RFC 3339.
    pub question_deadline: String,
    /// Progress for both players, requester first.
    pub players: [PlayerProgress; 2],
    /// The shared deck in play order.
    pub deck: Vec<QuestionView>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Completion timestamp, RFC 3339, once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl MatchSummary {
    /// Assemble the wire view from the stored row and a fresh reconciliation
    /// pass.
    pub fn assemble(row: &MatchEntity, progress: &ProgressSnapshot, deadline: std::time::SystemTime) -> Self {
        Self {
            id: row.id,
            rounds: row.rounds,
            category: row.category.clone(),
            difficulty: row.difficulty,
            status: row.status,
            current_question: progress.current_question,
            current_turn_player_id: progress.current_turn_player_id,
            question_started_at: format_system_time(row.question_started_at),
            question_deadline: format_system_time(deadline),
            players: [
                PlayerProgress {
                    player_id: row.player1_id,
                    name: row.player1_name.clone(),
                    next_question: progress.player1_next_question,
                    answered_current: progress.player1_answered_current,
                    score: progress.player1_score,
                },
                PlayerProgress {
                    player_id: row.player2_id,
                    name: row.player2_name.clone(),
                    next_question: progress.player2_next_question,
                    answered_current: progress.player2_answered_current,
                    score: progress.player2_score,
                },
            ],
            deck: row.deck.iter().map(QuestionView::from).collect(),
            created_at: format_system_time(row.created_at),
            finished_at: row.finished_at.map(format_system_time),
        }
    }
}

/// Payload used to record an answer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordAnswerInput {
    /// Player submitting the answer.
    pub player_id: Uuid,
    /// Deck index the answer targets.
    pub question_index: u32,
    /// Chosen answer, as an index into the question's choices.
    pub answer_value: u32,
    /// Time the player spent on the question, in milliseconds.
    pub time_spent_ms: u64,
}

/// Result of an answer submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecordAnswerResponse {
    /// False when an identical answer fact already existed; the caller should
    /// proceed as if its own write succeeded.
    pub accepted: bool,
    /// Whether this submission advanced the shared question pointer.
    pub advanced: bool,
    /// Shared question pointer after the submission settled.
    pub next_question: u32,
    /// Whether the match reached its terminal state.
    pub match_finished: bool,
}

/// Payload notifying that a player opened the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuestionOpenedInput {
    /// Player who opened the question.
    pub player_id: Uuid,
}
