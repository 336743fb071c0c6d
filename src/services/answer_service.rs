//! Answer recording and match reads. The insert of an answer fact is the
//! single write of record; the cached flags on the match row are a derived,
//! best-effort mirror updated afterwards and may be skipped without breaking
//! correctness.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::AnswerInsert,
        models::{AnswerEntity, MatchEntity, MatchStatus, PlayerSlot},
    },
    dto::matches::{MatchSummary, QuestionOpenedInput, RecordAnswerInput, RecordAnswerResponse},
    error::ServiceError,
    services::{advancement, progress, sse_events},
    state::SharedState,
};

/// Record one player's answer to the current question of a match.
///
/// Idempotent under retry or duplicated UI events: when a row with the same
/// `(match_id, player_id, question_index)` already exists the call reports
/// `accepted = false` and performs no further writes.
pub async fn record_answer(
    state: &SharedState,
    match_id: Uuid,
    input: RecordAnswerInput,
) -> Result<RecordAnswerResponse, ServiceError> {
    let store = state.require_store().await?;
    let Some(row) = store.find_match(match_id).await? else {
        return Err(ServiceError::NotFound(format!("match `{match_id}`")));
    };
    let Some(slot) = row.slot_of(input.player_id) else {
        return Err(ServiceError::InvalidInput(format!(
            "player `{}` is not part of match `{match_id}`",
            input.player_id
        )));
    };
    // A resubmission is answered from the log before any state gate, so a
    // retry that lands after the match moved on never turns into an error.
    if store
        .find_answer(match_id, input.player_id, input.question_index)
        .await?
        .is_some()
    {
        let answers = store.answers_for_match(match_id).await?;
        let current = progress::effective_question(&row, &answers);
        return Ok(duplicate_response(
            match_id,
            input.player_id,
            current,
            row.status == MatchStatus::Finished,
        ));
    }

    if row.status == MatchStatus::Finished {
        return Err(ServiceError::InvalidState(format!(
            "match `{match_id}` is finished"
        )));
    }

    // The first interaction opens the question window; losing this race to
    // the opponent is fine.
    let row = if row.status == MatchStatus::Active {
        store.open_match(match_id, SystemTime::now()).await?;
        let Some(opened) = store.find_match(match_id).await? else {
            return Err(ServiceError::NotFound(format!("match `{match_id}`")));
        };
        opened
    } else {
        row
    };

    let answers = store.answers_for_match(match_id).await?;
    let current = progress::effective_question(&row, &answers);
    if current >= row.rounds {
        return Err(ServiceError::InvalidState(format!(
            "match `{match_id}` has no open question"
        )));
    }
    if input.question_index != current {
        return Err(ServiceError::InvalidState(format!(
            "question {} is not the current question ({current})",
            input.question_index
        )));
    }

    let question = &row.deck[current as usize];
    if input.answer_value as usize >= question.choices.len() {
        return Err(ServiceError::InvalidInput(format!(
            "answer value {} is out of range for question {current}",
            input.answer_value
        )));
    }

    let fact = AnswerEntity {
        match_id,
        player_id: input.player_id,
        question_index: current,
        answer_value: input.answer_value,
        time_spent_ms: input.time_spent_ms,
        answered_at: SystemTime::now(),
    };
    // A concurrent duplicate that slipped past the read above is still
    // caught by the unique index.
    if store.insert_answer(fact).await? == AnswerInsert::Duplicate {
        return Ok(duplicate_response(match_id, input.player_id, current, false));
    }

    mirror_answered_flag(state, &row, input.player_id, slot, current, &answers).await;
    sse_events::broadcast_answer_submitted(state, match_id, input.player_id, current);

    let outcome = advancement::try_advance(state, match_id).await?;
    Ok(RecordAnswerResponse {
        accepted: true,
        advanced: outcome.advanced,
        next_question: outcome.next_question,
        match_finished: outcome.finished,
    })
}

fn duplicate_response(
    match_id: Uuid,
    player_id: Uuid,
    current: u32,
    finished: bool,
) -> RecordAnswerResponse {
    info!(%match_id, %player_id, question = current, "duplicate answer ignored");
    RecordAnswerResponse {
        accepted: false,
        advanced: false,
        next_question: current,
        match_finished: finished,
    }
}

/// Read a match with progress derived from the answer log, running the
/// timeout sweep first so an expired window is settled before the read.
pub async fn get_match(state: &SharedState, match_id: Uuid) -> Result<MatchSummary, ServiceError> {
    advancement::sweep_expired(state, match_id).await?;

    let store = state.require_store().await?;
    let Some(row) = store.find_match(match_id).await? else {
        return Err(ServiceError::NotFound(format!("match `{match_id}`")));
    };
    let answers = store.answers_for_match(match_id).await?;
    let snapshot = progress::reconcile(&row, &answers);
    let deadline = row.question_started_at + state.config().question_window();
    Ok(MatchSummary::assemble(&row, &snapshot, deadline))
}

/// Note that a player opened the current question, opening the first question
/// window when needed and publishing the `question_started` hint.
pub async fn note_question_opened(
    state: &SharedState,
    match_id: Uuid,
    input: QuestionOpenedInput,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let Some(row) = store.find_match(match_id).await? else {
        return Err(ServiceError::NotFound(format!("match `{match_id}`")));
    };
    if row.slot_of(input.player_id).is_none() {
        return Err(ServiceError::InvalidInput(format!(
            "player `{}` is not part of match `{match_id}`",
            input.player_id
        )));
    }
    if row.status == MatchStatus::Finished {
        return Err(ServiceError::InvalidState(format!(
            "match `{match_id}` is finished"
        )));
    }

    if row.status == MatchStatus::Active {
        store.open_match(match_id, SystemTime::now()).await?;
    }

    let answers = store.answers_for_match(match_id).await?;
    let current = progress::effective_question(&row, &answers);
    sse_events::broadcast_question_started(state, match_id, input.player_id, current);
    Ok(())
}

/// Mirror a freshly inserted answer onto the cached flags. Failure only costs
/// a fast path; reads reconcile from the log either way.
async fn mirror_answered_flag(
    state: &SharedState,
    row: &MatchEntity,
    player_id: Uuid,
    slot: PlayerSlot,
    question_index: u32,
    answers_before: &[AnswerEntity],
) {
    let turn_hint = match row.opponent_of(player_id) {
        Some(opponent) if !progress::has_answered(answers_before, opponent, question_index) => {
            Some(opponent)
        }
        _ => None,
    };

    let store = match state.match_store().await {
        Some(store) => store,
        None => return,
    };
    if let Err(err) = store
        .mark_answered(row.id, slot, question_index, turn_hint)
        .await
    {
        warn!(
            match_id = %row.id,
            error = %err,
            "failed to mirror answered flag; log stays authoritative"
        );
    }
}
