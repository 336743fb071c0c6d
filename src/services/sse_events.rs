//! Event names and fan-out helpers for the realtime channel. Every publish
//! here is fire-and-forget: consumers treat the payloads as hints to re-read
//! the match, never as authoritative state.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::sse::{
        AnswerSubmittedEvent, BothAnsweredEvent, MatchAcceptedEvent, QuestionStartedEvent,
        ServerEvent,
    },
    state::SharedState,
};

const EVENT_MATCH_ACCEPTED: &str = "match_accepted";
const EVENT_QUESTION_STARTED: &str = "question_started";
const EVENT_ANSWER_SUBMITTED: &str = "answer_submitted";
const EVENT_BOTH_ANSWERED: &str = "both_answered";

/// Broadcast that a matchmaking request was claimed and a match created.
///
/// Goes to the lobby (so list views refresh) and to the new match topic (so a
/// requester already waiting on it learns about the opponent).
pub fn broadcast_match_accepted(
    state: &SharedState,
    request_id: Uuid,
    match_id: Uuid,
    accepter_id: Uuid,
    accepter_name: &str,
) {
    let payload = MatchAcceptedEvent {
        request_id,
        match_id,
        accepter_id,
        accepter_name: accepter_name.to_owned(),
    };
    send_lobby_event(state, EVENT_MATCH_ACCEPTED, &payload);
    send_match_event(state, match_id, EVENT_MATCH_ACCEPTED, &payload);
}

/// Broadcast that a player opened the current question.
pub fn broadcast_question_started(
    state: &SharedState,
    match_id: Uuid,
    player_id: Uuid,
    question_index: u32,
) {
    let payload = QuestionStartedEvent {
        match_id,
        player_id,
        question_index,
    };
    send_match_event(state, match_id, EVENT_QUESTION_STARTED, &payload);
}

/// Broadcast that an answer fact was recorded.
pub fn broadcast_answer_submitted(
    state: &SharedState,
    match_id: Uuid,
    player_id: Uuid,
    question_index: u32,
) {
    let payload = AnswerSubmittedEvent {
        match_id,
        player_id,
        question_index,
    };
    send_match_event(state, match_id, EVENT_ANSWER_SUBMITTED, &payload);
}

/// Broadcast the settlement of a question after an advance attempt. When the
/// match finished, the topic hub is dropped afterwards so open subscriber
/// streams terminate.
pub fn broadcast_both_answered(
    state: &SharedState,
    match_id: Uuid,
    question_index: u32,
    next_question: u32,
    finished: bool,
) {
    let payload = BothAnsweredEvent {
        match_id,
        question_index,
        next_question,
        finished,
    };
    send_match_event(state, match_id, EVENT_BOTH_ANSWERED, &payload);
    if finished {
        state.sse().drop_match_topic(match_id);
    }
}

fn send_lobby_event<T: Serialize>(state: &SharedState, event: &str, payload: &T) {
    match ServerEvent::json(event.to_owned(), payload) {
        Ok(server_event) => state.sse().lobby().broadcast(server_event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}

fn send_match_event<T: Serialize>(state: &SharedState, match_id: Uuid, event: &str, payload: &T) {
    match ServerEvent::json(event.to_owned(), payload) {
        Ok(server_event) => state.sse().match_topic(match_id).broadcast(server_event),
        Err(err) => warn!(event, %match_id, error = %err, "failed to serialize SSE payload"),
    }
}
