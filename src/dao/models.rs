use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a matchmaking request. Terminal once accepted or cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for a second player to claim it.
    Pending,
    /// Claimed by exactly one accepter; a match was created.
    Accepted,
    /// Withdrawn by the requester or expired unclaimed.
    Cancelled,
}

/// Lifecycle of a match. `Finished` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created but no question window is open yet.
    Active,
    /// A question window is open and answers are accepted.
    QuestionActive,
    /// All rounds are settled; no further answers are accepted.
    Finished,
}

/// Question difficulty used to filter the deck draw.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Entry-level questions.
    Easy,
    /// Mid-tier questions.
    Medium,
    /// Expert questions.
    Hard,
}

/// Identifies which of the two match seats a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSlot {
    /// The original requester.
    Player1,
    /// The accepter.
    Player2,
}

/// An open offer to play, awaiting acceptance by a second player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRequestEntity {
    /// Primary key of the request.
    pub id: Uuid,
    /// Player who opened the request.
    pub requester_id: Uuid,
    /// Display name of the requester, echoed to potential accepters.
    pub requester_name: String,
    /// Number of questions the resulting match will have.
    pub rounds: u32,
    /// Question category filter ("any" matches every category).
    pub category: String,
    /// Question difficulty filter.
    pub difficulty: Difficulty,
    /// Current lifecycle state.
    pub status: RequestStatus,
    /// Set exactly once by the winning claimer.
    pub accepter_id: Option<Uuid>,
    /// Display name of the winning claimer, echoed to losing claimers.
    pub accepter_name: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Instant after which the request may no longer be claimed.
    pub expires_at: SystemTime,
}

/// One entry of a match deck. The deck is fixed at match creation so both
/// players see an identical question order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Question text.
    pub prompt: String,
    /// Answer choices presented to the player.
    pub choices: Vec<String>,
    /// Index into `choices` of the correct answer.
    pub correct_choice: u32,
    /// Category this question belongs to.
    pub category: String,
    /// Difficulty tier of this question.
    pub difficulty: Difficulty,
}

/// One asynchronous quiz session between two players.
///
/// `current_question`, the answered flags, and `current_turn_player_id` are a
/// denormalized cache of what the answer log implies. They may lag behind the
/// log and must never be trusted over it when the two disagree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Player who opened the original request.
    pub player1_id: Uuid,
    /// Player who claimed the request.
    pub player2_id: Uuid,
    /// Display name of player 1.
    pub player1_name: String,
    /// Display name of player 2.
    pub player2_name: String,
    /// Number of questions; always equals `deck.len()`.
    pub rounds: u32,
    /// Category the deck was drawn from.
    pub category: String,
    /// Difficulty the deck was drawn at.
    pub difficulty: Difficulty,
    /// Shared question sequence, immutable once the match is created.
    pub deck: Vec<QuestionEntity>,
    /// Cached shared question pointer.
    pub current_question: u32,
    /// Cached flag: player 1 answered the current question.
    pub player1_answered_current: bool,
    /// Cached flag: player 2 answered the current question.
    pub player2_answered_current: bool,
    /// Cached turn hint; `None` when either player may answer.
    pub current_turn_player_id: Option<Uuid>,
    /// Instant the current question window opened.
    pub question_started_at: SystemTime,
    /// Current lifecycle state.
    pub status: MatchStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Set once when the match reaches `Finished`.
    pub finished_at: Option<SystemTime>,
}

impl MatchEntity {
    /// Seat occupied by `player_id`, if the player belongs to this match.
    pub fn slot_of(&self, player_id: Uuid) -> Option<PlayerSlot> {
        if player_id == self.player1_id {
            Some(PlayerSlot::Player1)
        } else if player_id == self.player2_id {
            Some(PlayerSlot::Player2)
        } else {
            None
        }
    }

    /// The opponent of `player_id` within this match.
    pub fn opponent_of(&self, player_id: Uuid) -> Option<Uuid> {
        match self.slot_of(player_id)? {
            PlayerSlot::Player1 => Some(self.player2_id),
            PlayerSlot::Player2 => Some(self.player1_id),
        }
    }
}

/// Immutable record of one player's response to one question in one match.
///
/// Unique per `(match_id, player_id, question_index)`; never updated or
/// deleted. The full history for a match is the ground truth for progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Match this answer belongs to.
    pub match_id: Uuid,
    /// Player who answered.
    pub player_id: Uuid,
    /// Deck index the answer targets.
    pub question_index: u32,
    /// Chosen answer, as an index into the question's choices.
    pub answer_value: u32,
    /// Time the player spent on the question, in milliseconds.
    pub time_spent_ms: u64,
    /// Submission timestamp.
    pub answered_at: SystemTime,
}
