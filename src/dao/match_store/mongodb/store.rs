use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::{sync::RwLock, time::sleep};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoAnswerDocument, MongoMatchDocument, MongoRequestDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    match_store::{AnswerInsert, MatchStore},
    models::{AnswerEntity, MatchEntity, MatchRequestEntity, PlayerSlot},
    storage::StorageResult,
};

const REQUEST_COLLECTION_NAME: &str = "match_requests";
const MATCH_COLLECTION_NAME: &str = "matches";
const ANSWER_COLLECTION_NAME: &str = "answers";

/// Server error code raised when an insert violates a unique index.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed [`MatchStore`].
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive so the connection pool outlives individual database handles.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = connect_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// Build a client and wait for the database to answer a ping, backing off
/// between retries per the configured schedule.
async fn connect_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut retries = config.backoff_schedule().into_iter();
    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(err) => match retries.next() {
                Some(delay) => sleep(delay).await,
                None => {
                    return Err(MongoDaoError::InitialPing {
                        attempts: config.ping_retries + 1,
                        source: err,
                    });
                }
            },
        }
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = connect_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// The unique compound index on answers is the idempotency key the whole
    /// recorder relies on; the request index speeds up the expiry sweep.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let answers = database.collection::<MongoAnswerDocument>(ANSWER_COLLECTION_NAME);
        let answer_index = mongodb::IndexModel::builder()
            .keys(doc! {"match_id": 1, "player_id": 1, "question_index": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("answer_identity_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        answers
            .create_index(answer_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ANSWER_COLLECTION_NAME,
                index: "match_id,player_id,question_index",
                source,
            })?;

        let requests = database.collection::<MongoRequestDocument>(REQUEST_COLLECTION_NAME);
        let request_index = mongodb::IndexModel::builder()
            .keys(doc! {"status": 1, "expires_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("request_expiry_idx".to_owned()))
                    .build(),
            )
            .build();
        requests
            .create_index(request_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: REQUEST_COLLECTION_NAME,
                index: "status,expires_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn request_collection(&self) -> Collection<MongoRequestDocument> {
        self.database()
            .await
            .collection::<MongoRequestDocument>(REQUEST_COLLECTION_NAME)
    }

    async fn match_collection(&self) -> Collection<MongoMatchDocument> {
        self.database()
            .await
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn answer_collection(&self) -> Collection<MongoAnswerDocument> {
        self.database()
            .await
            .collection::<MongoAnswerDocument>(ANSWER_COLLECTION_NAME)
    }

    async fn insert_request(&self, request: MatchRequestEntity) -> MongoResult<()> {
        let id = request.id;
        let document: MongoRequestDocument = request.into();
        self.request_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveRequest { id, source })?;
        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> MongoResult<Option<MatchRequestEntity>> {
        let document = self
            .request_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRequest { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_pending_requests(&self) -> MongoResult<Vec<MatchRequestEntity>> {
        let documents: Vec<MongoRequestDocument> = self
            .request_collection()
            .await
            .find(doc! {"status": "pending"})
            .await
            .map_err(|source| MongoDaoError::ListRequests { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRequests { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn claim_request(
        &self,
        id: Uuid,
        accepter_id: Uuid,
        accepter_name: String,
    ) -> MongoResult<u64> {
        let result = self
            .request_collection()
            .await
            .update_one(
                doc! {
                    "_id": uuid_as_binary(id),
                    "status": "pending",
                    "accepter_id": null,
                },
                doc! {"$set": {
                    "status": "accepted",
                    "accepter_id": uuid_as_binary(accepter_id),
                    "accepter_name": accepter_name,
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateRequest { id, source })?;
        Ok(result.matched_count)
    }

    async fn cancel_request(&self, id: Uuid) -> MongoResult<u64> {
        let result = self
            .request_collection()
            .await
            .update_one(
                doc! {"_id": uuid_as_binary(id), "status": "pending"},
                doc! {"$set": {"status": "cancelled"}},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateRequest { id, source })?;
        Ok(result.matched_count)
    }

    async fn cancel_expired_requests(&self, cutoff: SystemTime) -> MongoResult<u64> {
        let result = self
            .request_collection()
            .await
            .update_many(
                doc! {
                    "status": "pending",
                    "expires_at": {"$lt": DateTime::from_system_time(cutoff)},
                },
                doc! {"$set": {"status": "cancelled"}},
            )
            .await
            .map_err(|source| MongoDaoError::ListRequests { source })?;
        Ok(result.modified_count)
    }

    async fn insert_match(&self, row: MatchEntity) -> MongoResult<()> {
        let id = row.id;
        let document: MongoMatchDocument = row.into();
        self.match_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;
        Ok(())
    }

    async fn find_match(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .match_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn open_match(&self, id: Uuid, started_at: SystemTime) -> MongoResult<u64> {
        let result = self
            .match_collection()
            .await
            .update_one(
                doc! {"_id": uuid_as_binary(id), "status": "active"},
                doc! {"$set": {
                    "status": "question_active",
                    "question_started_at": DateTime::from_system_time(started_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateMatch { id, source })?;
        Ok(result.matched_count)
    }

    async fn advance_match(
        &self,
        id: Uuid,
        expected_question: u32,
        started_at: SystemTime,
    ) -> MongoResult<u64> {
        let result = self
            .match_collection()
            .await
            .update_one(
                doc! {
                    "_id": uuid_as_binary(id),
                    "current_question": expected_question,
                    "status": "question_active",
                },
                doc! {"$set": {
                    "current_question": expected_question + 1,
                    "player1_answered_current": false,
                    "player2_answered_current": false,
                    "current_turn_player_id": null,
                    "question_started_at": DateTime::from_system_time(started_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateMatch { id, source })?;
        Ok(result.matched_count)
    }

    async fn finish_match(
        &self,
        id: Uuid,
        expected_question: u32,
        finished_at: SystemTime,
    ) -> MongoResult<u64> {
        let result = self
            .match_collection()
            .await
            .update_one(
                doc! {
                    "_id": uuid_as_binary(id),
                    "current_question": expected_question,
                    "status": "question_active",
                },
                doc! {"$set": {
                    "current_question": expected_question + 1,
                    "player1_answered_current": false,
                    "player2_answered_current": false,
                    "current_turn_player_id": null,
                    "status": "finished",
                    "finished_at": DateTime::from_system_time(finished_at),
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateMatch { id, source })?;
        Ok(result.matched_count)
    }

    async fn mark_answered(
        &self,
        id: Uuid,
        slot: PlayerSlot,
        question_index: u32,
        turn_hint: Option<Uuid>,
    ) -> MongoResult<u64> {
        let flag_field = match slot {
            PlayerSlot::Player1 => "player1_answered_current",
            PlayerSlot::Player2 => "player2_answered_current",
        };
        let turn = match turn_hint {
            Some(player_id) => mongodb::bson::Bson::Binary(uuid_as_binary(player_id)),
            None => mongodb::bson::Bson::Null,
        };
        let result = self
            .match_collection()
            .await
            .update_one(
                doc! {
                    "_id": uuid_as_binary(id),
                    "current_question": question_index,
                },
                doc! {"$set": {
                    flag_field: true,
                    "current_turn_player_id": turn,
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateMatch { id, source })?;
        Ok(result.matched_count)
    }

    async fn insert_answer(&self, answer: AnswerEntity) -> MongoResult<AnswerInsert> {
        let match_id = answer.match_id;
        let document: MongoAnswerDocument = answer.into();
        match self.answer_collection().await.insert_one(&document).await {
            Ok(_) => Ok(AnswerInsert::Inserted),
            Err(err) if is_duplicate_key(&err) => Ok(AnswerInsert::Duplicate),
            Err(source) => Err(MongoDaoError::SaveAnswer { match_id, source }),
        }
    }

    async fn find_answer(
        &self,
        match_id: Uuid,
        player_id: Uuid,
        question_index: u32,
    ) -> MongoResult<Option<AnswerEntity>> {
        let document = self
            .answer_collection()
            .await
            .find_one(doc! {
                "match_id": uuid_as_binary(match_id),
                "player_id": uuid_as_binary(player_id),
                "question_index": question_index,
            })
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { match_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn answers_for_match(&self, match_id: Uuid) -> MongoResult<Vec<AnswerEntity>> {
        let documents: Vec<MongoAnswerDocument> = self
            .answer_collection()
            .await
            .find(doc! {"match_id": uuid_as_binary(match_id)})
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { match_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { match_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl MatchStore for MongoMatchStore {
    fn insert_request(&self, request: MatchRequestEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_request(request).await.map_err(Into::into) })
    }

    fn find_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_request(id).await.map_err(Into::into) })
    }

    fn list_pending_requests(&self) -> BoxFuture<'static, StorageResult<Vec<MatchRequestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_pending_requests().await.map_err(Into::into) })
    }

    fn claim_request(
        &self,
        id: Uuid,
        accepter_id: Uuid,
        accepter_name: String,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .claim_request(id, accepter_id, accepter_name)
                .await
                .map_err(Into::into)
        })
    }

    fn cancel_request(&self, id: Uuid) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.cancel_request(id).await.map_err(Into::into) })
    }

    fn cancel_expired_requests(&self, cutoff: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .cancel_expired_requests(cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_match(&self, row: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match(row).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn open_match(&self, id: Uuid, started_at: SystemTime) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.open_match(id, started_at).await.map_err(Into::into) })
    }

    fn advance_match(
        &self,
        id: Uuid,
        expected_question: u32,
        started_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .advance_match(id, expected_question, started_at)
                .await
                .map_err(Into::into)
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
            store
                .finish_match(id, expected_question, finished_at)
                .await
                .map_err(Into::into)
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
            store
                .mark_answered(id, slot, question_index, turn_hint)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<AnswerInsert>> {
        let store = self.clone();
        Box::pin(async move { store.insert_answer(answer).await.map_err(Into::into) })
    }

    fn find_answer(
        &self,
        match_id: Uuid,
        player_id: Uuid,
        question_index: u32,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_answer(match_id, player_id, question_index)
                .await
                .map_err(Into::into)
        })
    }

    fn answers_for_match(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.answers_for_match(match_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
