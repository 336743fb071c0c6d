//! Question bank seam. The engine never manages quiz content itself; it only
//! needs a collaborator that can produce a fixed deck for a new match. The
//! bundled implementation reads a JSON bank from disk, which is enough for
//! development and small deployments.

use std::{fs, io::ErrorKind, path::Path};

use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;
use tracing::{info, warn};

use crate::dao::models::{Difficulty, QuestionEntity};

/// Category value that matches every question in the bank.
pub const ANY_CATEGORY: &str = "any";

/// Errors raised while drawing a deck.
#[derive(Debug, Error)]
pub enum DeckError {
    /// The bank cannot cover the requested deck size under the given filters.
    #[error(
        "question bank holds {available} {difficulty:?} question(s) for category `{category}`, {requested} requested"
    )]
    NotEnoughQuestions {
        /// Deck size the caller asked for.
        requested: u32,
        /// Matching questions available in the bank.
        available: usize,
        /// Category filter applied.
        category: String,
        /// Difficulty filter applied.
        difficulty: Difficulty,
    },
}

/// Collaborator that produces match decks.
///
/// A deck is drawn exactly once per match, at claim time, and is immutable
/// afterwards so both players see an identical question order.
pub trait DeckSource: Send + Sync {
    /// Draw `rounds` distinct questions matching the category and difficulty
    /// filters, in play order.
    fn draw(
        &self,
        rounds: u32,
        category: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<QuestionEntity>, DeckError>;
}

/// [`DeckSource`] backed by a JSON file loaded once at startup.
pub struct BundledDeckSource {
    bank: Vec<QuestionEntity>,
}

impl BundledDeckSource {
    /// Load the bank from disk, falling back to a small built-in set when the
    /// file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Vec<QuestionEntity>>(&contents) {
                Ok(bank) => {
                    info!(path = %path.display(), questions = bank.len(), "loaded question bank");
                    Self { bank }
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse question bank; using the built-in set"
                    );
                    Self::builtin()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "question bank file not found; using the built-in set"
                );
                Self::builtin()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read question bank; using the built-in set"
                );
                Self::builtin()
            }
        }
    }

    /// Build a source over an explicit bank.
    pub fn from_bank(bank: Vec<QuestionEntity>) -> Self {
        Self { bank }
    }

    fn builtin() -> Self {
        Self {
            bank: builtin_bank(),
        }
    }
}

impl DeckSource for BundledDeckSource {
    fn draw(
        &self,
        rounds: u32,
        category: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<QuestionEntity>, DeckError> {
        let pool: Vec<&QuestionEntity> = self
            .bank
            .iter()
            .filter(|question| question.difficulty == difficulty)
            .filter(|question| category == ANY_CATEGORY || question.category == category)
            .collect();

        if pool.len() < rounds as usize {
            return Err(DeckError::NotEnoughQuestions {
                requested: rounds,
                available: pool.len(),
                category: category.to_owned(),
                difficulty,
            });
        }

        let mut rng = rand::rng();
        let mut deck: Vec<QuestionEntity> = pool
            .choose_multiple(&mut rng, rounds as usize)
            .map(|question| (*question).clone())
            .collect();
        deck.shuffle(&mut rng);
        Ok(deck)
    }
}

/// Minimal bank so a fresh checkout can run without any configuration.
fn builtin_bank() -> Vec<QuestionEntity> {
    let entry = |prompt: &str,
                 choices: [&str; 4],
                 correct_choice: u32,
                 category: &str,
                 difficulty: Difficulty| QuestionEntity {
        prompt: prompt.to_owned(),
        choices: choices.iter().map(|choice| (*choice).to_owned()).collect(),
        correct_choice,
        category: category.to_owned(),
        difficulty,
    };

    vec![
        entry(
            "Which planet is closest to the sun?",
            ["Venus", "Mercury", "Mars", "Earth"],
            1,
            "science",
            Difficulty::Easy,
        ),
        entry(
            "How many sides does a hexagon have?",
            ["Five", "Six", "Seven", "Eight"],
            1,
            "science",
            Difficulty::Easy,
        ),
        entry(
            "Which ocean is the largest?",
            ["Atlantic", "Indian", "Pacific", "Arctic"],
            2,
            "geography",
            Difficulty::Easy,
        ),
        entry(
            "What is the capital of Australia?",
            ["Sydney", "Melbourne", "Canberra", "Perth"],
            2,
            "geography",
            Difficulty::Medium,
        ),
        entry(
            "Which element has the symbol Fe?",
            ["Iron", "Fluorine", "Francium", "Fermium"],
            0,
            "science",
            Difficulty::Medium,
        ),
        entry(
            "In which year did the Berlin Wall fall?",
            ["1987", "1989", "1991", "1993"],
            1,
            "history",
            Difficulty::Medium,
        ),
        entry(
            "Who formulated the incompleteness theorems?",
            ["Hilbert", "Turing", "Goedel", "Cantor"],
            2,
            "science",
            Difficulty::Hard,
        ),
        entry(
            "Which treaty ended the Thirty Years' War?",
            [
                "Treaty of Utrecht",
                "Peace of Westphalia",
                "Treaty of Tordesillas",
                "Peace of Augsburg",
            ],
            1,
            "history",
            Difficulty::Hard,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_entry(category: &str, difficulty: Difficulty, tag: usize) -> QuestionEntity {
        QuestionEntity {
            prompt: format!("{category} question {tag}"),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_choice: 0,
            category: category.to_owned(),
            difficulty,
        }
    }

    fn source() -> BundledDeckSource {
        let mut bank = Vec::new();
        for tag in 0..5 {
            bank.push(bank_entry("history", Difficulty::Easy, tag));
            bank.push(bank_entry("science", Difficulty::Easy, tag));
            bank.push(bank_entry("science", Difficulty::Hard, tag));
        }
        BundledDeckSource::from_bank(bank)
    }

    #[test]
    fn draw_respects_filters_and_size() {
        let deck = source().draw(4, "science", Difficulty::Easy).expect("draw");
        assert_eq!(deck.len(), 4);
        assert!(
            deck.iter()
                .all(|q| q.category == "science" && q.difficulty == Difficulty::Easy)
        );
    }

    #[test]
    fn draw_yields_distinct_questions() {
        let deck = source().draw(5, "history", Difficulty::Easy).expect("draw");
        let mut prompts: Vec<&str> = deck.iter().map(|q| q.prompt.as_str()).collect();
        prompts.sort_unstable();
        prompts.dedup();
        assert_eq!(prompts.len(), 5);
    }

    #[test]
    fn any_category_spans_the_whole_bank() {
        let deck = source().draw(10, ANY_CATEGORY, Difficulty::Easy).expect("draw");
        assert_eq!(deck.len(), 10);
    }

    #[test]
    fn insufficient_bank_is_reported_with_counts() {
        let err = source()
            .draw(6, "history", Difficulty::Easy)
            .expect_err("bank is too small");
        match err {
            DeckError::NotEnoughQuestions {
                requested,
                available,
                category,
                difficulty,
            } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
                assert_eq!(category, "history");
                assert_eq!(difficulty, Difficulty::Easy);
            }
        }
    }

    #[test]
    fn builtin_bank_covers_every_difficulty() {
        let source = BundledDeckSource::builtin();
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let deck = source.draw(2, ANY_CATEGORY, difficulty).expect("draw");
            assert_eq!(deck.len(), 2);
        }
    }
}
