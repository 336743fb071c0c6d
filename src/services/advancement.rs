//! Advancement coordination. Once the answer log shows a question settled,
//! the shared pointer is moved through a conditional update keyed on the
//! stored `(current_question, status)` pair. Any number of actors may attempt
//! the same advancement concurrently; at most one write lands and a zero-row
//! result means the desired end state was already reached.

use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{MatchEntity, MatchStatus},
    },
    error::ServiceError,
    services::{progress, sse_events},
    state::SharedState,
};

/// Result of one advancement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Whether this caller's write was the one that moved the pointer.
    pub advanced: bool,
    /// Shared question pointer after the attempt settled.
    pub next_question: u32,
    /// Whether the match reached its terminal state.
    pub finished: bool,
}

/// Advance the match if the answer log shows the current question settled.
///
/// Invoked after every recorded answer and by the timeout sweep. A no-op
/// (`advanced = false`) when the other player's answer is still outstanding.
pub async fn try_advance(
    state: &SharedState,
    match_id: Uuid,
) -> Result<AdvanceOutcome, ServiceError> {
    let store = state.require_store().await?;
    let Some(row) = store.find_match(match_id).await? else {
        return Err(ServiceError::NotFound(format!("match `{match_id}`")));
    };
    if row.status == MatchStatus::Finished {
        return Ok(AdvanceOutcome {
            advanced: false,
            next_question: row.rounds,
            finished: true,
        });
    }

    let answers = store.answers_for_match(match_id).await?;
    let current = progress::effective_question(&row, &answers);

    if current > row.current_question {
        // The log already moved past the stored pointer's question: it is
        // settled, so catch the pointer up one step.
        return settle(state, &store, &row, row.current_question).await;
    }
    if current >= row.rounds {
        // Log fully settled but the row never reached its terminal state.
        return settle(state, &store, &row, row.rounds.saturating_sub(1)).await;
    }

    if !progress::both_answered(&answers, row.player1_id, row.player2_id, current) {
        return Ok(AdvanceOutcome {
            advanced: false,
            next_question: current,
            finished: false,
        });
    }

    // Pointer and scan agree and both rows are present: only a forfeit gap
    // behind the pointer makes this branch reachable.
    settle(state, &store, &row, current).await
}

/// Check the current question window of a match and force advancement when it
/// has expired with an answer outstanding. The silent player forfeits the
/// question for scoring purposes only; no answer row is ever synthesized.
///
/// Invoked lazily on match reads. Returns whether a question timed out.
pub async fn sweep_expired(state: &SharedState, match_id: Uuid) -> Result<bool, ServiceError> {
    let store = state.require_store().await?;
    let Some(row) = store.find_match(match_id).await? else {
        return Err(ServiceError::NotFound(format!("match `{match_id}`")));
    };
    // Only an open question window has a deadline. A match still in `active`
    // has not started its clock yet.
    if row.status != MatchStatus::QuestionActive {
        return Ok(false);
    }

    let deadline = row.question_started_at + state.config().question_window();
    if SystemTime::now() < deadline {
        return Ok(false);
    }

    let answers = store.answers_for_match(match_id).await?;
    let current = progress::effective_question(&row, &answers);
    if current > row.current_question || current >= row.rounds {
        // The stored pointer merely lags a settled log; catching it up is
        // ordinary advancement, not a timeout.
        let settled = row.current_question.min(row.rounds.saturating_sub(1));
        settle(state, &store, &row, settled).await?;
        return Ok(false);
    }

    warn!(
        %match_id,
        question = current,
        "question window expired; forcing advancement"
    );
    // One forced step per sweep: the forced advance opens a fresh window, and
    // later questions get their own full deadline.
    settle(state, &store, &row, current).await?;
    Ok(true)
}

/// Persist the settlement of `settled_question` and fan out `both_answered`.
///
/// The conditional update is keyed on the stored pointer, so when the cache
/// lags the log the pointer catches up one step per call while reads stay
/// correct through reconciliation.
async fn settle(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    row: &MatchEntity,
    settled_question: u32,
) -> Result<AdvanceOutcome, ServiceError> {
    let next_question = settled_question + 1;
    let finished = next_question >= row.rounds;
    let now = SystemTime::now();

    let matched = if finished {
        store.finish_match(row.id, row.current_question, now).await?
    } else {
        store
            .advance_match(row.id, row.current_question, now)
            .await?
    };

    if matched == 0 {
        // Another actor already moved the pointer; their write is as good as
        // ours and the event below still lets clients converge.
        debug!(match_id = %row.id, settled_question, "advance lost the race");
    } else {
        info!(
            match_id = %row.id,
            settled_question,
            next_question,
            finished,
            "advanced match"
        );
    }

    sse_events::broadcast_both_answered(state, row.id, settled_question, next_question, finished);

    Ok(AdvanceOutcome {
        advanced: matched == 1,
        next_question,
        finished,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            match_store::memory::MemoryMatchStore,
            models::{AnswerEntity, Difficulty, QuestionEntity},
        },
        services::deck::BundledDeckSource,
        state::AppState,
    };

    async fn state_with_store() -> (SharedState, Arc<dyn MatchStore>) {
        let deck = Arc::new(BundledDeckSource::from_bank(Vec::new()));
        let state = AppState::new(AppConfig::default(), deck);
        let store: Arc<dyn MatchStore> = Arc::new(MemoryMatchStore::new());
        state.install_store(store.clone()).await;
        (state, store)
    }

    fn question() -> QuestionEntity {
        QuestionEntity {
            prompt: "?".into(),
            choices: vec!["a".into(), "b".into()],
            correct_choice: 0,
            category: "general".into(),
            difficulty: Difficulty::Easy,
        }
    }

    fn match_row(rounds: u32) -> MatchEntity {
        let now = SystemTime::now();
        MatchEntity {
            id: Uuid::new_v4(),
            player1_id: Uuid::new_v4(),
            player2_id: Uuid::new_v4(),
            player1_name: "ada".into(),
            player2_name: "grace".into(),
            rounds,
            category: "general".into(),
            difficulty: Difficulty::Easy,
            deck: (0..rounds).map(|_| question()).collect(),
            current_question: 0,
            player1_answered_current: false,
            player2_answered_current: false,
            current_turn_player_id: None,
            question_started_at: now,
            status: MatchStatus::QuestionActive,
            created_at: now,
            finished_at: None,
        }
    }

    fn answer(row: &MatchEntity, player_id: Uuid, question_index: u32) -> AnswerEntity {
        AnswerEntity {
            match_id: row.id,
            player_id,
            question_index,
            answer_value: 0,
            time_spent_ms: 700,
            answered_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn no_advance_while_an_answer_is_outstanding() {
        let (state, store) = state_with_store().await;
        let row = match_row(3);
        store.insert_match(row.clone()).await.unwrap();
        store.insert_answer(answer(&row, row.player1_id, 0)).await.unwrap();

        let outcome = try_advance(&state, row.id).await.unwrap();
        assert!(!outcome.advanced);
        assert_eq!(outcome.next_question, 0);
        assert!(!outcome.finished);
    }

    #[tokio::test]
    async fn advance_moves_pointer_once_both_answered() {
        let (state, store) = state_with_store().await;
        let row = match_row(3);
        store.insert_match(row.clone()).await.unwrap();
        store.insert_answer(answer(&row, row.player1_id, 0)).await.unwrap();
        store.insert_answer(answer(&row, row.player2_id, 0)).await.unwrap();

        let outcome = try_advance(&state, row.id).await.unwrap();
        assert!(outcome.advanced);
        assert_eq!(outcome.next_question, 1);
        assert!(!outcome.finished);

        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 1);
        assert_eq!(stored.status, MatchStatus::QuestionActive);
        assert!(!stored.player1_answered_current);
        assert!(!stored.player2_answered_current);
    }

    #[tokio::test]
    async fn repeated_advance_is_a_no_op() {
        let (state, store) = state_with_store().await;
        let row = match_row(3);
        store.insert_match(row.clone()).await.unwrap();
        store.insert_answer(answer(&row, row.player1_id, 0)).await.unwrap();
        store.insert_answer(answer(&row, row.player2_id, 0)).await.unwrap();

        let first = try_advance(&state, row.id).await.unwrap();
        let second = try_advance(&state, row.id).await.unwrap();
        assert!(first.advanced);
        assert!(!second.advanced);
        assert_eq!(second.next_question, 1);

        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 1);
    }

    #[tokio::test]
    async fn racing_advances_mutate_the_row_exactly_once() {
        let (state, store) = state_with_store().await;
        let row = match_row(3);
        store.insert_match(row.clone()).await.unwrap();
        store.insert_answer(answer(&row, row.player1_id, 0)).await.unwrap();
        store.insert_answer(answer(&row, row.player2_id, 0)).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let state = state.clone();
            let match_id = row.id;
            tasks.push(tokio::spawn(
                async move { try_advance(&state, match_id).await },
            ));
        }

        let mut advanced_count = 0;
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            if outcome.advanced {
                advanced_count += 1;
            }
        }
        assert_eq!(advanced_count, 1);

        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 1);
    }

    #[tokio::test]
    async fn last_question_finishes_the_match() {
        let (state, store) = state_with_store().await;
        let row = match_row(1);
        store.insert_match(row.clone()).await.unwrap();
        store.insert_answer(answer(&row, row.player1_id, 0)).await.unwrap();
        store.insert_answer(answer(&row, row.player2_id, 0)).await.unwrap();

        let outcome = try_advance(&state, row.id).await.unwrap();
        assert!(outcome.advanced);
        assert!(outcome.finished);

        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Finished);
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn sweep_leaves_fresh_windows_alone() {
        let (state, store) = state_with_store().await;
        let row = match_row(2);
        store.insert_match(row.clone()).await.unwrap();

        assert!(!sweep_expired(&state, row.id).await.unwrap());
        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 0);
    }

    #[tokio::test]
    async fn timeout_forces_progress_without_synthesizing_rows() {
        let (state, store) = state_with_store().await;
        let mut row = match_row(3);
        row.question_started_at = SystemTime::now() - Duration::from_secs(3 * 3600);
        store.insert_match(row.clone()).await.unwrap();
        store.insert_answer(answer(&row, row.player1_id, 0)).await.unwrap();

        assert!(sweep_expired(&state, row.id).await.unwrap());

        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 1);
        assert_eq!(stored.status, MatchStatus::QuestionActive);
        // The log stays a truthful record: still a single row.
        assert_eq!(store.answers_for_match(row.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sweep_forces_at_most_one_question_per_invocation() {
        let (state, store) = state_with_store().await;
        let mut row = match_row(3);
        row.question_started_at = SystemTime::now() - Duration::from_secs(3 * 3600);
        store.insert_match(row.clone()).await.unwrap();

        assert!(sweep_expired(&state, row.id).await.unwrap());
        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 1);
        // The forced advance stamped a fresh window, so the next sweep sees
        // nothing expired.
        assert!(!sweep_expired(&state, row.id).await.unwrap());
    }

    #[tokio::test]
    async fn expired_window_on_the_last_question_finishes_the_match() {
        let (state, store) = state_with_store().await;
        let mut row = match_row(1);
        row.question_started_at = SystemTime::now() - Duration::from_secs(3 * 3600);
        store.insert_match(row.clone()).await.unwrap();

        assert!(sweep_expired(&state, row.id).await.unwrap());
        let stored = store.find_match(row.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Finished);
    }
}
