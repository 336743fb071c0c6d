//! In-memory [`MatchStore`] used by the test suite and by storage-less
//! development runs. Implements the same conditional-update semantics as the
//! durable backends: every mutation checks the expected prior state under the
//! lock and reports the matched row count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::match_store::{AnswerInsert, MatchStore};
use crate::dao::models::{
    AnswerEntity, MatchEntity, MatchRequestEntity, MatchStatus, PlayerSlot, RequestStatus,
};
use crate::dao::storage::StorageResult;

#[derive(Default)]
struct MemoryInner {
    requests: HashMap<Uuid, MatchRequestEntity>,
    matches: HashMap<Uuid, MatchEntity>,
    answers: HashMap<(Uuid, Uuid, u32), AnswerEntity>,
}

/// Volatile store backed by mutex-guarded maps.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only happens if a previous caller panicked while
        // holding it; propagating the panic is the honest outcome here.
        self.inner.lock().expect("memory store lock poisoned")
    }
}

impl MatchStore for MemoryMatchStore {
    fn insert_request(&self, request: MatchRequestEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.lock().requests.insert(request.id, request);
            Ok(())
        })
    }

    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().requests.get(&id).cloned()) })
    }

    fn list_pending_requests(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .requests
                .values()
                .filter(|request| request.status == RequestStatus::Pending)
                .cloned()
                .collect())
        })
    }

    fn claim_request(
        &self,
        id: Uuid,
        accepter_id: Uuid,
        accepter_name: String,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.lock();
            let Some(request) = guard.requests.get_mut(&id) else {
                return Ok(0);
            };
            if request.status != RequestStatus::Pending || request.accepter_id.is_some() {
                return Ok(0);
            }
            request.status = RequestStatus::Accepted;
            request.accepter_id = Some(accepter_id);
            request.accepter_name = Some(accepter_name);
            Ok(1)
        })
    }

    fn cancel_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.lock();
            let Some(request) = guard.requests.get_mut(&id) else {
                return Ok(0);
            };
            if request.status != RequestStatus::Pending {
                return Ok(0);
            }
            request.status = RequestStatus::Cancelled;
            Ok(1)
        })
    }

    fn cancel_expired_requests(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut cancelled = 0;
            let mut guard = store.lock();
            for request in guard.requests.values_mut() {
                if request.status == RequestStatus::Pending && request.expires_at < cutoff {
                    request.status = RequestStatus::Cancelled;
                    cancelled += 1;
                }
            }
            Ok(cancelled)
        })
    }

    fn insert_match(&self, row: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.lock().matches.insert(row.id, row);
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().matches.get(&id).cloned()) })
    }

    fn open_match(&self, id: Uuid, started_at: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.lock();
            let Some(row) = guard.matches.get_mut(&id) else {
                return Ok(0);
            };
            if row.status != MatchStatus::Active {
                return Ok(0);
            }
            row.status = MatchStatus::QuestionActive;
            row.question_started_at = started_at;
            Ok(1)
        })
    }

    fn advance_match(
        &self,
        id: Uuid,
        expected_question: u32,
        started_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.lock();
            let Some(row) = guard.matches.get_mut(&id) else {
                return Ok(0);
            };
            if row.status != MatchStatus::QuestionActive || row.current_question != expected_question
            {
                return Ok(0);
            }
            row.current_question = expected_question + 1;
            row.player1_answered_current = false;
            row.player2_answered_current = false;
            row.current_turn_player_id = None;
            row.question_started_at = started_at;
            Ok(1)
        })
    }

    fn finish_match(
        &self,
        id: Uuid,
        expected_question: u32,
        finished_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.lock();
            let Some(row) = guard.matches.get_mut(&id) else {
                return Ok(0);
            };
            if row.status != MatchStatus::QuestionActive || row.current_question != expected_question
            {
                return Ok(0);
            }
            row.current_question = expected_question + 1;
            row.player1_answered_current = false;
            row.player2_answered_current = false;
            row.current_turn_player_id = None;
            row.status = MatchStatus::Finished;
            row.finished_at = Some(finished_at);
            Ok(1)
        })
    }

    fn mark_answered(
        &self,
        id: Uuid,
        slot: PlayerSlot,
        question_index: u32,
        turn_hint: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.lock();
            let Some(row) = guard.matches.get_mut(&id) else {
                return Ok(0);
            };
            if row.current_question != question_index {
                return Ok(0);
            }
            match slot {
                PlayerSlot::Player1 => row.player1_answered_current = true,
                PlayerSlot::Player2 => row.player2_answered_current = true,
            }
            row.current_turn_player_id = turn_hint;
            Ok(1)
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<AnswerInsert>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (answer.match_id, answer.player_id, answer.question_index);
            let mut guard = store.lock();
            if guard.answers.contains_key(&key) {
                return Ok(AnswerInsert::Duplicate);
            }
            guard.answers.insert(key, answer);
            Ok(AnswerInsert::Inserted)
        })
    }

    fn find_answer(
        &self,
        match_id: Uuid,
        player_id: Uuid,
        question_index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .answers
                .get(&(match_id, player_id, question_index))
                .cloned())
        })
    }

    fn answers_for_match(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .answers
                .values()
                .filter(|answer| answer.match_id == match_id)
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn pending_request(id: Uuid) -> MatchRequestEntity {
        let now = SystemTime::now();
        MatchRequestEntity {
            id,
            requester_id: Uuid::new_v4(),
            requester_name: "ada".into(),
            rounds: 3,
            category: "any".into(),
            difficulty: crate::dao::models::Difficulty::Medium,
            status: RequestStatus::Pending,
            accepter_id: None,
            accepter_name: None,
            created_at: now,
            expires_at: now + Duration::from_secs(300),
        }
    }

    fn answer(match_id: Uuid, player_id: Uuid, question_index: u32) -> AnswerEntity {
        AnswerEntity {
            match_id,
            player_id,
            question_index,
            answer_value: 0,
            time_spent_ms: 1200,
            answered_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let store = MemoryMatchStore::new();
        let id = Uuid::new_v4();
        store.insert_request(pending_request(id)).await.unwrap();

        let first = store
            .claim_request(id, Uuid::new_v4(), "grace".into())
            .await
            .unwrap();
        let second = store
            .claim_request(id, Uuid::new_v4(), "alan".into())
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        let stored = store.find_request(id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = MemoryMatchStore::new();
        let id = Uuid::new_v4();
        store.insert_request(pending_request(id)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .claim_request(id, Uuid::new_v4(), "racer".into())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            winners += handle.await.unwrap();
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected_without_second_row() {
        let store = MemoryMatchStore::new();
        let match_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();

        let first = store.insert_answer(answer(match_id, player_id, 0)).await.unwrap();
        let second = store.insert_answer(answer(match_id, player_id, 0)).await.unwrap();

        assert_eq!(first, AnswerInsert::Inserted);
        assert_eq!(second, AnswerInsert::Duplicate);
        assert_eq!(store.answers_for_match(match_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn advance_is_keyed_on_expected_question() {
        let store = MemoryMatchStore::new();
        let now = SystemTime::now();
        let row = MatchEntity {
            id: Uuid::new_v4(),
            player1_id: Uuid::new_v4(),
            player2_id: Uuid::new_v4(),
            player1_name: "ada".into(),
            player2_name: "grace".into(),
            rounds: 3,
            category: "any".into(),
            difficulty: crate::dao::models::Difficulty::Easy,
            deck: Vec::new(),
            current_question: 0,
            player1_answered_current: true,
            player2_answered_current: true,
            current_turn_player_id: None,
            question_started_at: now,
            status: MatchStatus::QuestionActive,
            created_at: now,
            finished_at: None,
        };
        let id = row.id;
        store.insert_match(row).await.unwrap();

        assert_eq!(store.advance_match(id, 0, now).await.unwrap(), 1);
        // Re-applying the same advancement loses the race on purpose.
        assert_eq!(store.advance_match(id, 0, now).await.unwrap(), 0);

        let stored = store.find_match(id).await.unwrap().unwrap();
        assert_eq!(stored.current_question, 1);
        assert!(!stored.player1_answered_current);
        assert!(!stored.player2_answered_current);
    }

    #[tokio::test]
    async fn expiry_sweep_only_touches_expired_pending_rows() {
        let store = MemoryMatchStore::new();
        let now = SystemTime::now();

        let mut expired = pending_request(Uuid::new_v4());
        expired.expires_at = now - Duration::from_secs(1);
        let fresh = pending_request(Uuid::new_v4());
        let fresh_id = fresh.id;
        store.insert_request(expired).await.unwrap();
        store.insert_request(fresh).await.unwrap();

        assert_eq!(store.cancel_expired_requests(now).await.unwrap(), 1);
        let remaining = store.list_pending_requests().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh_id);
    }
}
