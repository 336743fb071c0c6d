use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    AnswerEntity, Difficulty, MatchEntity, MatchRequestEntity, MatchStatus, QuestionEntity,
    RequestStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRequestDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    requester_id: Uuid,
    requester_name: String,
    rounds: u32,
    category: String,
    difficulty: Difficulty,
    status: RequestStatus,
    accepter_id: Option<Uuid>,
    accepter_name: Option<String>,
    created_at: DateTime,
    expires_at: DateTime,
}

impl From<MatchRequestEntity> for MongoRequestDocument {
    fn from(value: MatchRequestEntity) -> Self {
        Self {
            id: value.id,
            requester_id: value.requester_id,
            requester_name: value.requester_name,
            rounds: value.rounds,
            category: value.category,
            difficulty: value.difficulty,
            status: value.status,
            accepter_id: value.accepter_id,
            accepter_name: value.accepter_name,
            created_at: DateTime::from_system_time(value.created_at),
            expires_at: DateTime::from_system_time(value.expires_at),
        }
    }
}

impl From<MongoRequestDocument> for MatchRequestEntity {
    fn from(value: MongoRequestDocument) -> Self {
        Self {
            id: value.id,
            requester_id: value.requester_id,
            requester_name: value.requester_name,
            rounds: value.rounds,
            category: value.category,
            difficulty: value.difficulty,
            status: value.status,
            accepter_id: value.accepter_id,
            accepter_name: value.accepter_name,
            created_at: value.created_at.to_system_time(),
            expires_at: value.expires_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    player1_id: Uuid,
    player2_id: Uuid,
    player1_name: String,
    player2_name: String,
    rounds: u32,
    category: String,
    difficulty: Difficulty,
    deck: Vec<QuestionEntity>,
    current_question: u32,
    player1_answered_current: bool,
    player2_answered_current: bool,
    current_turn_player_id: Option<Uuid>,
    question_started_at: DateTime,
    status: MatchStatus,
    created_at: DateTime,
    finished_at: Option<DateTime>,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            player1_name: value.player1_name,
            player2_name: value.player2_name,
            rounds: value.rounds,
            category: value.category,
            difficulty: value.difficulty,
            deck: value.deck,
            current_question: value.current_question,
            player1_answered_current: value.player1_answered_current,
            player2_answered_current: value.player2_answered_current,
            current_turn_player_id: value.current_turn_player_id,
            question_started_at: DateTime::from_system_time(value.question_started_at),
            status: value.status,
            created_at: DateTime::from_system_time(value.created_at),
            finished_at: value.finished_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            player1_name: value.player1_name,
            player2_name: value.player2_name,
            rounds: value.rounds,
            category: value.category,
            difficulty: value.difficulty,
            deck: value.deck,
            current_question: value.current_question,
            player1_answered_current: value.player1_answered_current,
            player2_answered_current: value.player2_answered_current,
            current_turn_player_id: value.current_turn_player_id,
            question_started_at: value.question_started_at.to_system_time(),
            status: value.status,
            created_at: value.created_at.to_system_time(),
            finished_at: value.finished_at.map(|at| at.to_system_time()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    match_id: Uuid,
    player_id: Uuid,
    question_index: u32,
    answer_value: u32,
    time_spent_ms: u64,
    answered_at: DateTime,
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            match_id: value.match_id,
            player_id: value.player_id,
            question_index: value.question_index,
            answer_value: value.answer_value,
            time_spent_ms: value.time_spent_ms,
            answered_at: DateTime::from_system_time(value.answered_at),
        }
    }
}

impl From<MongoAnswerDocument> for AnswerEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            match_id: value.match_id,
            player_id: value.player_id,
            question_index: value.question_index,
            answer_value: value.answer_value,
            time_spent_ms: value.time_spent_ms,
            answered_at: value.answered_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
