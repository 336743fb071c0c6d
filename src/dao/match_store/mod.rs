//! Persistence contract for the match synchronization engine.
//!
//! Every mutation of a shared record goes through a conditional update: the
//! backend applies the write only if the stored row still matches the
//! expected prior state and reports how many rows matched. A zero return
//! means the caller lost a race and must re-read rather than assume success.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{AnswerEntity, MatchEntity, MatchRequestEntity, PlayerSlot};
use crate::dao::storage::StorageResult;

/// Outcome of appending an answer fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerInsert {
    /// The fact was stored; this caller's write is the single write of record.
    Inserted,
    /// A row with the same `(match_id, player_id, question_index)` already
    /// exists. Not an error: recording is idempotent under retry.
    Duplicate,
}

/// Abstraction over the durable record store for requests, matches, and the
/// append-only answer log.
pub trait MatchStore: Send + Sync {
    /// Persist a freshly created matchmaking request.
    fn insert_request(&self, request: MatchRequestEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Point read of a matchmaking request.
    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRequestEntity>>>;

    /// All requests currently in the pending state.
    fn list_pending_requests(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRequestEntity>>>;

    /// Conditionally accept a pending request: transitions
    /// `pending -> accepted` and sets the accepter only if the stored row is
    /// still pending with no accepter. Returns the number of rows matched.
    fn claim_request(
        &self,
        id: Uuid,
        accepter_id: Uuid,
        accepter_name: String,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Conditionally cancel a request that is still pending. Returns the
    /// number of rows matched.
    fn cancel_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<u64>>;

    /// Cancel every pending request whose `expires_at` precedes `cutoff`.
    /// Returns how many requests were cancelled.
    fn cancel_expired_requests(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<u64>>;

    /// Persist a freshly created match.
    fn insert_match(&self, row: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Point read of a match.
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;

    /// Conditionally open the first question window: transitions
    /// `active -> question_active` and stamps `started_at`. Returns the
    /// number of rows matched; zero means the window was already open.
    fn open_match(&self, id: Uuid, started_at: SystemTime) -> BoxFuture<'static, StorageResult<u64>>;

    /// Conditionally advance the shared question pointer from
    /// `expected_question` to `expected_question + 1`, resetting the answered
    /// flags, clearing the turn hint, and stamping `started_at` as the new
    /// window start. Matches only while the match is in `question_active`.
    /// Returns the number of rows matched; zero means another actor already
    /// advanced.
    fn advance_match(
        &self,
        id: Uuid,
        expected_question: u32,
        started_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Conditionally finish the match, keyed on the same
    /// `(current_question, status)` pair as [`MatchStore::advance_match`].
    /// Returns the number of rows matched.
    fn finish_match(
        &self,
        id: Uuid,
        expected_question: u32,
        finished_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Best-effort mirror of the answer log onto the cached flags: marks the
    /// given seat as having answered `question_index` and stores the turn
    /// hint, only while `question_index` is still the current question.
    /// Skipping this write never breaks correctness.
    fn mark_answered(
        &self,
        id: Uuid,
        slot: PlayerSlot,
        question_index: u32,
        turn_hint: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Append an answer fact, enforcing the per-player uniqueness key.
    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<AnswerInsert>>;

    /// Point read of an answer fact.
    fn find_answer(
        &self,
        match_id: Uuid,
        player_id: Uuid,
        question_index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>>;

    /// The full answer log for a match, in no guaranteed order.
    fn answers_for_match(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;

    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish a dropped backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
