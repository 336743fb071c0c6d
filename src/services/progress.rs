//! Progress reconciliation: every "which question / whose turn / what score"
//! answer is recomputed from the append-only answer log. The cached columns
//! on the match row are a fast-path hint; whenever hint and scan disagree the
//! scan wins, except that a timeout forfeit may legitimately leave the stored
//! pointer ahead of a gap in the log (the log is never back-filled).

use tracing::debug;
use uuid::Uuid;

use crate::dao::models::{AnswerEntity, MatchEntity, MatchStatus, QuestionEntity};

/// Derived view of a match, assembled by [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Effective shared question pointer; equals `rounds` when all questions
    /// are settled.
    pub current_question: u32,
    /// First question player 1 has not answered, at or after the pointer.
    pub player1_next_question: u32,
    /// First question player 2 has not answered, at or after the pointer.
    pub player2_next_question: u32,
    /// Whether player 1 has an answer row at the effective pointer.
    pub player1_answered_current: bool,
    /// Whether player 2 has an answer row at the effective pointer.
    pub player2_answered_current: bool,
    /// The non-answerer, when exactly one player answered the current question.
    pub current_turn_player_id: Option<Uuid>,
    /// Player 1 score graded against the deck.
    pub player1_score: u32,
    /// Player 2 score graded against the deck.
    pub player2_score: u32,
}

/// Whether `player_id` has an answer row at `question_index`.
pub fn has_answered(answers: &[AnswerEntity], player_id: Uuid, question_index: u32) -> bool {
    answers
        .iter()
        .any(|answer| answer.player_id == player_id && answer.question_index == question_index)
}

/// Smallest index in `[0, rounds)` for which `player_id` has no answer row.
///
/// This is the canonical per-player pointer: it reports the first gap even
/// when later questions were answered out of order.
pub fn next_unanswered(answers: &[AnswerEntity], player_id: Uuid, rounds: u32) -> u32 {
    (0..rounds)
        .find(|index| !has_answered(answers, player_id, *index))
        .unwrap_or(rounds)
}

/// Smallest unanswered index for `player_id` at or after `floor`.
fn next_unanswered_from(answers: &[AnswerEntity], player_id: Uuid, rounds: u32, floor: u32) -> u32 {
    (floor..rounds)
        .find(|index| !has_answered(answers, player_id, *index))
        .unwrap_or(rounds)
}

/// True iff both players have an answer row at `question_index`.
pub fn both_answered(
    answers: &[AnswerEntity],
    player1_id: Uuid,
    player2_id: Uuid,
    question_index: u32,
) -> bool {
    has_answered(answers, player1_id, question_index)
        && has_answered(answers, player2_id, question_index)
}

/// Effective shared question pointer for a match.
///
/// The log scan yields the smallest question either player still owes; the
/// stored pointer wins only when it is ahead (a forfeit moved it past a log
/// gap). A finished match pins the pointer at `rounds`.
pub fn effective_question(row: &MatchEntity, answers: &[AnswerEntity]) -> u32 {
    if row.status == MatchStatus::Finished {
        return row.rounds;
    }

    let scanned = next_unanswered(answers, row.player1_id, row.rounds)
        .min(next_unanswered(answers, row.player2_id, row.rounds));

    if scanned > row.current_question {
        debug!(
            match_id = %row.id,
            cached = row.current_question,
            scanned,
            "cached question pointer lags the answer log; using the scan"
        );
    }

    scanned.max(row.current_question).min(row.rounds)
}

/// Number of points `player_id` earned, grading each answer row against the
/// deck. A question with no row scores zero, which is how a timeout forfeit
/// affects scoring without ever touching the log.
pub fn score(deck: &[QuestionEntity], answers: &[AnswerEntity], player_id: Uuid) -> u32 {
    answers
        .iter()
        .filter(|answer| answer.player_id == player_id)
        .filter(|answer| {
            deck.get(answer.question_index as usize)
                .is_some_and(|question| question.correct_choice == answer.answer_value)
        })
        .count() as u32
}

/// Recompute the full derived view of a match from its answer log.
pub fn reconcile(row: &MatchEntity, answers: &[AnswerEntity]) -> ProgressSnapshot {
    let current = effective_question(row, answers);

    let (player1_answered_current, player2_answered_current) = if current < row.rounds {
        (
            has_answered(answers, row.player1_id, current),
            has_answered(answers, row.player2_id, current),
        )
    } else {
        (false, false)
    };

    let current_turn_player_id = match (player1_answered_current, player2_answered_current) {
        (true, false) => Some(row.player2_id),
        (false, true) => Some(row.player1_id),
        _ => None,
    };

    ProgressSnapshot {
        current_question: current,
        player1_next_question: next_unanswered_from(answers, row.player1_id, row.rounds, current),
        player2_next_question: next_unanswered_from(answers, row.player2_id, row.rounds, current),
        player1_answered_current,
        player2_answered_current,
        current_turn_player_id,
        player1_score: score(&row.deck, answers, row.player1_id),
        player2_score: score(&row.deck, answers, row.player2_id),
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::Difficulty;

    fn question(correct_choice: u32) -> QuestionEntity {
        QuestionEntity {
            prompt: "?".into(),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_choice,
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
            deck: (0..rounds).map(|_| question(0)).collect(),
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

    fn answer(row: &MatchEntity, player_id: Uuid, question_index: u32, value: u32) -> AnswerEntity {
        AnswerEntity {
            match_id: row.id,
            player_id,
            question_index,
            answer_value: value,
            time_spent_ms: 900,
            answered_at: SystemTime::now(),
        }
    }

    #[test]
    fn next_unanswered_counts_contiguous_answers() {
        let row = match_row(5);
        let answers = vec![
            answer(&row, row.player1_id, 0, 0),
            answer(&row, row.player1_id, 1, 1),
        ];
        assert_eq!(next_unanswered(&answers, row.player1_id, 5), 2);
        assert_eq!(next_unanswered(&answers, row.player2_id, 5), 0);
    }

    #[test]
    fn next_unanswered_reports_first_gap_even_out_of_order() {
        let row = match_row(5);
        // Index 1 is missing; index 2 was answered out of order.
        let answers = vec![
            answer(&row, row.player1_id, 0, 0),
            answer(&row, row.player1_id, 2, 0),
        ];
        assert_eq!(next_unanswered(&answers, row.player1_id, 5), 1);
    }

    #[test]
    fn next_unanswered_saturates_at_rounds() {
        let row = match_row(2);
        let answers = vec![
            answer(&row, row.player1_id, 0, 0),
            answer(&row, row.player1_id, 1, 0),
        ];
        assert_eq!(next_unanswered(&answers, row.player1_id, 2), 2);
    }

    #[test]
    fn both_answered_requires_both_rows() {
        let row = match_row(3);
        let mut answers = vec![answer(&row, row.player1_id, 0, 0)];
        assert!(!both_answered(&answers, row.player1_id, row.player2_id, 0));

        answers.push(answer(&row, row.player2_id, 0, 2));
        assert!(both_answered(&answers, row.player1_id, row.player2_id, 0));
    }

    #[test]
    fn scan_wins_when_cache_lags() {
        let mut row = match_row(3);
        // Both players answered question 0 but the cached pointer was never
        // bumped (the advance write was lost).
        row.current_question = 0;
        let answers = vec![
            answer(&row, row.player1_id, 0, 0),
            answer(&row, row.player2_id, 0, 0),
        ];
        assert_eq!(effective_question(&row, &answers), 1);
    }

    #[test]
    fn stored_pointer_wins_after_forfeit() {
        let mut row = match_row(3);
        // Player 2 forfeited question 0 on timeout: the pointer moved to 1
        // but the log has no row for player 2 at index 0.
        row.current_question = 1;
        let answers = vec![answer(&row, row.player1_id, 0, 0)];
        assert_eq!(effective_question(&row, &answers), 1);

        let snapshot = reconcile(&row, &answers);
        assert_eq!(snapshot.current_question, 1);
        assert_eq!(snapshot.player1_next_question, 1);
        // Player 2's next question skips the forfeited index.
        assert_eq!(snapshot.player2_next_question, 1);
    }

    #[test]
    fn turn_belongs_to_the_non_answerer() {
        let row = match_row(3);
        let answers = vec![answer(&row, row.player1_id, 0, 0)];
        let snapshot = reconcile(&row, &answers);
        assert_eq!(snapshot.current_turn_player_id, Some(row.player2_id));
        assert!(snapshot.player1_answered_current);
        assert!(!snapshot.player2_answered_current);
    }

    #[test]
    fn no_turn_when_neither_or_both_answered() {
        let row = match_row(3);
        assert_eq!(reconcile(&row, &[]).current_turn_player_id, None);

        let answers = vec![
            answer(&row, row.player1_id, 0, 0),
            answer(&row, row.player2_id, 0, 0),
        ];
        // Both answered: the effective pointer moves on and no turn is owed
        // at the new question yet.
        let snapshot = reconcile(&row, &answers);
        assert_eq!(snapshot.current_question, 1);
        assert_eq!(snapshot.current_turn_player_id, None);
    }

    #[test]
    fn scores_grade_against_the_deck() {
        let mut row = match_row(3);
        row.deck = vec![question(1), question(2), question(0)];
        let answers = vec![
            answer(&row, row.player1_id, 0, 1), // correct
            answer(&row, row.player1_id, 1, 0), // wrong
            answer(&row, row.player2_id, 0, 0), // wrong
            answer(&row, row.player2_id, 1, 2), // correct
        ];
        let snapshot = reconcile(&row, &answers);
        assert_eq!(snapshot.player1_score, 1);
        assert_eq!(snapshot.player2_score, 1);
    }

    #[test]
    fn forfeited_question_scores_zero_without_a_row() {
        let mut row = match_row(2);
        row.current_question = 1;
        let answers = vec![
            answer(&row, row.player1_id, 0, 0), // correct
        ];
        let snapshot = reconcile(&row, &answers);
        assert_eq!(snapshot.player1_score, 1);
        assert_eq!(snapshot.player2_score, 0);
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn finished_match_pins_pointer_at_rounds() {
        let mut row = match_row(2);
        row.status = MatchStatus::Finished;
        row.current_question = 2;
        let snapshot = reconcile(&row, &[]);
        assert_eq!(snapshot.current_question, 2);
        assert!(!snapshot.player1_answered_current);
        assert_eq!(snapshot.current_turn_player_id, None);
    }

    #[test]
    fn reconcile_is_stable_under_interleaving_order() {
        let row = match_row(3);
        let a = answer(&row, row.player1_id, 0, 0);
        let b = answer(&row, row.player2_id, 0, 1);
        let c = answer(&row, row.player1_id, 1, 0);

        let one_order = vec![a.clone(), b.clone(), c.clone()];
        let other_order = vec![c, b, a];
        assert_eq!(reconcile(&row, &one_order), reconcile(&row, &other_order));
    }
}
