//! Matchmaking request lifecycle: creation, listing, the claim race, and
//! expiry. The claim is the one place where two players compete for the same
//! row; a single conditional update decides the winner and a zero-row result
//! is always re-read for the most specific failure reason, never assumed.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, MatchRequestEntity, MatchStatus, RequestStatus},
    dto::{
        matches::MatchSummary,
        matchmaking::{ClaimRequestInput, CreateRequestInput, MatchRequestSummary},
    },
    error::ServiceError,
    services::{progress, sse_events},
    state::SharedState,
};

/// Open a new matchmaking request on behalf of a player.
pub async fn create_request(
    state: &SharedState,
    input: CreateRequestInput,
) -> Result<MatchRequestSummary, ServiceError> {
    let store = state.require_store().await?;
    let now = SystemTime::now();
    let entity = MatchRequestEntity {
        id: Uuid::new_v4(),
        requester_id: input.requester_id,
        requester_name: input.requester_name,
        rounds: input.rounds,
        category: input.category,
        difficulty: input.difficulty,
        status: RequestStatus::Pending,
        accepter_id: None,
        accepter_name: None,
        created_at: now,
        expires_at: now + state.config().request_expiry(),
    };
    store.insert_request(entity.clone()).await?;
    info!(
        request_id = %entity.id,
        requester_id = %entity.requester_id,
        rounds = entity.rounds,
        "created matchmaking request"
    );
    Ok(entity.into())
}

/// List claimable requests, sweeping expired ones first so callers never see
/// a request that can no longer be claimed.
pub async fn list_requests(state: &SharedState) -> Result<Vec<MatchRequestSummary>, ServiceError> {
    let store = state.require_store().await?;
    store.cancel_expired_requests(SystemTime::now()).await?;
    let pending = store.list_pending_requests().await?;
    Ok(pending.into_iter().map(Into::into).collect())
}

/// Claim a pending request, creating the match.
///
/// Exactly one claimer ever succeeds per request. Everyone else gets
/// [`ServiceError::AlreadyClaimed`] carrying the winner's name when the
/// record still holds it.
pub async fn claim_request(
    state: &SharedState,
    request_id: Uuid,
    input: ClaimRequestInput,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_store().await?;
    store.cancel_expired_requests(SystemTime::now()).await?;

    // Precondition pass against the current record. Only a fast path: the
    // conditional update below is what actually decides the race.
    let Some(request) = store.find_request(request_id).await? else {
        return Err(ServiceError::NotFound(format!("request `{request_id}`")));
    };
    match request.status {
        RequestStatus::Pending => {}
        RequestStatus::Accepted => {
            return Err(ServiceError::AlreadyClaimed {
                winner: request.accepter_name,
            });
        }
        RequestStatus::Cancelled => {
            return Err(ServiceError::NotPending(format!(
                "request `{request_id}` was cancelled"
            )));
        }
    }
    if request.requester_id == input.claimer_id {
        return Err(ServiceError::InvalidInput(
            "a request cannot be claimed by its own requester".into(),
        ));
    }

    // Draw the deck before touching the request so a bank shortfall fails
    // cleanly without consuming the claim.
    let deck = state
        .deck_source()
        .draw(request.rounds, &request.category, request.difficulty)?;

    let matched = store
        .claim_request(request_id, input.claimer_id, input.claimer_name.clone())
        .await?;
    if matched == 0 {
        return Err(classify_lost_claim(state, request_id).await?);
    }

    let now = SystemTime::now();
    let row = MatchEntity {
        id: Uuid::new_v4(),
        player1_id: request.requester_id,
        player2_id: input.claimer_id,
        player1_name: request.requester_name,
        player2_name: input.claimer_name.clone(),
        rounds: request.rounds,
        category: request.category,
        difficulty: request.difficulty,
        deck,
        current_question: 0,
        player1_answered_current: false,
        player2_answered_current: false,
        current_turn_player_id: None,
        question_started_at: now,
        status: MatchStatus::Active,
        created_at: now,
        finished_at: None,
    };
    store.insert_match(row.clone()).await?;

    info!(
        %request_id,
        match_id = %row.id,
        accepter_id = %input.claimer_id,
        "claimed matchmaking request"
    );
    sse_events::broadcast_match_accepted(
        state,
        request_id,
        row.id,
        input.claimer_id,
        &input.claimer_name,
    );

    let snapshot = progress::reconcile(&row, &[]);
    let deadline = row.question_started_at + state.config().question_window();
    Ok(MatchSummary::assemble(&row, &snapshot, deadline))
}

/// Cancel a pending request. Only the requester may do so.
pub async fn cancel_request(
    state: &SharedState,
    request_id: Uuid,
    requester_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let Some(request) = store.find_request(request_id).await? else {
        return Err(ServiceError::NotFound(format!("request `{request_id}`")));
    };
    if request.requester_id != requester_id {
        return Err(ServiceError::InvalidInput(
            "only the requester may cancel a request".into(),
        ));
    }

    let matched = store.cancel_request(request_id).await?;
    if matched == 0 {
        return Err(classify_lost_claim(state, request_id).await?);
    }
    info!(%request_id, "cancelled matchmaking request");
    Ok(())
}

/// Mark expired pending requests cancelled. Runs lazily on the list and claim
/// paths; the periodic background task calls this for promptness.
pub async fn sweep_expired_requests(state: &SharedState) -> Result<u64, ServiceError> {
    let Some(store) = state.match_store().await else {
        return Ok(0);
    };
    let cancelled = store.cancel_expired_requests(SystemTime::now()).await?;
    if cancelled > 0 {
        info!(cancelled, "cancelled expired matchmaking requests");
    }
    Ok(cancelled)
}

/// Re-read a request after a zero-row conditional update to report the most
/// specific reason the transition was not applied.
async fn classify_lost_claim(
    state: &SharedState,
    request_id: Uuid,
) -> Result<ServiceError, ServiceError> {
    let store = state.require_store().await?;
    Ok(match store.find_request(request_id).await? {
        None => ServiceError::NotFound(format!("request `{request_id}`")),
        Some(row) => match row.status {
            RequestStatus::Accepted => ServiceError::AlreadyClaimed {
                winner: row.accepter_name,
            },
            _ => ServiceError::NotPending(format!("request `{request_id}` is no longer pending")),
        },
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            match_store::{MatchStore, memory::MemoryMatchStore},
            models::{Difficulty, QuestionEntity},
        },
        services::deck::BundledDeckSource,
        state::AppState,
    };

    fn bank() -> Vec<QuestionEntity> {
        (0..12)
            .map(|tag| QuestionEntity {
                prompt: format!("question {tag}"),
                choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_choice: 0,
                category: "general".into(),
                difficulty: Difficulty::Easy,
            })
            .collect()
    }

    async fn state_with_store() -> (SharedState, Arc<dyn MatchStore>) {
        let deck = Arc::new(BundledDeckSource::from_bank(bank()));
        let state = AppState::new(AppConfig::default(), deck);
        let store: Arc<dyn MatchStore> = Arc::new(MemoryMatchStore::new());
        state.install_store(store.clone()).await;
        (state, store)
    }

    fn request_input(requester_id: Uuid) -> CreateRequestInput {
        CreateRequestInput {
            requester_id,
            requester_name: "ada".into(),
            rounds: 3,
            category: "general".into(),
            difficulty: Difficulty::Easy,
        }
    }

    fn claim_input(claimer_id: Uuid, name: &str) -> ClaimRequestInput {
        ClaimRequestInput {
            claimer_id,
            claimer_name: name.to_owned(),
        }
    }

    #[tokio::test]
    async fn created_request_is_listed_until_claimed() {
        let (state, _store) = state_with_store().await;
        let created = create_request(&state, request_input(Uuid::new_v4()))
            .await
            .unwrap();

        let listed = list_requests(&state).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        claim_request(&state, created.id, claim_input(Uuid::new_v4(), "grace"))
            .await
            .unwrap();
        assert!(list_requests(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_creates_a_fresh_match_with_the_requested_deck() {
        let (state, store) = state_with_store().await;
        let requester_id = Uuid::new_v4();
        let created = create_request(&state, request_input(requester_id))
            .await
            .unwrap();

        let claimer_id = Uuid::new_v4();
        let summary = claim_request(&state, created.id, claim_input(claimer_id, "grace"))
            .await
            .unwrap();
        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.deck.len(), 3);
        assert_eq!(summary.current_question, 0);
        assert_eq!(summary.players[0].player_id, requester_id);
        assert_eq!(summary.players[1].player_id, claimer_id);

        let row = store.find_match(summary.id).await.unwrap().unwrap();
        assert_eq!(row.status, MatchStatus::Active);
        assert_eq!(row.deck.len(), 3);
    }

    #[tokio::test]
    async fn requester_cannot_claim_their_own_request() {
        let (state, _store) = state_with_store().await;
        let requester_id = Uuid::new_v4();
        let created = create_request(&state, request_input(requester_id))
            .await
            .unwrap();

        let result = claim_request(&state, created.id, claim_input(requester_id, "ada")).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn losing_claimer_learns_the_winner_name() {
        let (state, _store) = state_with_store().await;
        let created = create_request(&state, request_input(Uuid::new_v4()))
            .await
            .unwrap();

        claim_request(&state, created.id, claim_input(Uuid::new_v4(), "grace"))
            .await
            .unwrap();
        let lost = claim_request(&state, created.id, claim_input(Uuid::new_v4(), "alan")).await;
        match lost {
            Err(ServiceError::AlreadyClaimed { winner }) => {
                assert_eq!(winner.as_deref(), Some("grace"));
            }
            other => panic!("expected AlreadyClaimed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn simultaneous_claims_produce_exactly_one_match() {
        let (state, store) = state_with_store().await;
        let created = create_request(&state, request_input(Uuid::new_v4()))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for index in 0..8 {
            let state = state.clone();
            let request_id = created.id;
            tasks.push(tokio::spawn(async move {
                claim_request(
                    &state,
                    request_id,
                    claim_input(Uuid::new_v4(), &format!("claimer-{index}")),
                )
                .await
            }));
        }

        let mut winners = Vec::new();
        for task in tasks {
            match task.await.unwrap() {
                Ok(summary) => winners.push(summary),
                Err(ServiceError::AlreadyClaimed { .. }) => {}
                Err(other) => panic!("unexpected claim failure: {other:?}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert!(
            store
                .find_match(winners[0].id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn expired_request_is_not_claimable() {
        let (state, store) = state_with_store().await;
        let created = create_request(&state, request_input(Uuid::new_v4()))
            .await
            .unwrap();

        // Backdate the expiry below the sweep cutoff.
        let mut row = store.find_request(created.id).await.unwrap().unwrap();
        row.expires_at = SystemTime::now() - Duration::from_secs(60);
        store.insert_request(row).await.unwrap();

        let result = claim_request(&state, created.id, claim_input(Uuid::new_v4(), "grace")).await;
        assert!(matches!(result, Err(ServiceError::NotPending(_))));
        assert!(list_requests(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_requester_may_cancel() {
        let (state, _store) = state_with_store().await;
        let requester_id = Uuid::new_v4();
        let created = create_request(&state, request_input(requester_id))
            .await
            .unwrap();

        let stranger = cancel_request(&state, created.id, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(ServiceError::InvalidInput(_))));

        cancel_request(&state, created.id, requester_id).await.unwrap();
        assert!(list_requests(&state).await.unwrap().is_empty());

        let again = cancel_request(&state, created.id, requester_id).await;
        assert!(matches!(again, Err(ServiceError::NotPending(_))));
    }

    #[tokio::test]
    async fn deck_shortfall_leaves_the_request_pending() {
        let deck = Arc::new(BundledDeckSource::from_bank(Vec::new()));
        let state = AppState::new(AppConfig::default(), deck);
        let store: Arc<dyn MatchStore> = Arc::new(MemoryMatchStore::new());
        state.install_store(store).await;

        let created = create_request(&state, request_input(Uuid::new_v4()))
            .await
            .unwrap();
        let result = claim_request(&state, created.id, claim_input(Uuid::new_v4(), "grace")).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        // The failed draw never consumed the request.
        assert_eq!(list_requests(&state).await.unwrap().len(), 1);
    }
}
