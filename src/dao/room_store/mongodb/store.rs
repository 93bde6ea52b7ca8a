use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMessageDocument, MongoRoomDocument, MongoVoteDocument, doc_id, vote_doc_key},
};
use crate::dao::{
    models::{MessageEntity, RoomEntity, VoteEntity},
    room_store::RoomStore,
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const MESSAGE_COLLECTION_NAME: &str = "messages";
const VOTE_COLLECTION_NAME: &str = "votes";

/// MongoDB-backed [`RoomStore`] implementation.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let messages = self.messages().await;
        let index = IndexModel::builder()
            .keys(doc! { "room_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("message_room_created_idx".to_owned()))
                    .build(),
            )
            .build();
        messages
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MESSAGE_COLLECTION_NAME,
                index: "room_id,created_at",
                source,
            })?;

        let votes = self.votes().await;
        let index = IndexModel::builder()
            .keys(doc! { "room_id": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("vote_room_idx".to_owned()))
                    .build(),
            )
            .build();
        votes
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: VOTE_COLLECTION_NAME,
                index: "room_id",
                source,
            })?;

        Ok(())
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard.database.collection(ROOM_COLLECTION_NAME)
    }

    async fn messages(&self) -> Collection<MongoMessageDocument> {
        let guard = self.inner.state.read().await;
        guard.database.collection(MESSAGE_COLLECTION_NAME)
    }

    async fn votes(&self) -> Collection<MongoVoteDocument> {
        let guard = self.inner.state.read().await;
        guard.database.collection(VOTE_COLLECTION_NAME)
    }

    async fn find_room(&self, room_id: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc_id(&room_id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { room_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_room(&self, room: RoomEntity) -> MongoResult<()> {
        let room_id = room.room_id.clone();
        let document: MongoRoomDocument = room.into();
        self.rooms()
            .await
            .replace_one(doc_id(&room_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { room_id, source })?;
        Ok(())
    }

    async fn append_message(&self, message: MessageEntity) -> MongoResult<()> {
        let room_id = message.room_id.clone();
        let document: MongoMessageDocument = message.into();
        self.messages()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendMessage { room_id, source })?;
        Ok(())
    }

    async fn list_messages(&self, room_id: String, limit: usize) -> MongoResult<Vec<MessageEntity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut documents: Vec<MongoMessageDocument> = self
            .messages()
            .await
            .find(doc! { "room_id": room_id.as_str() })
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::ListMessages {
                room_id: room_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMessages { room_id, source })?;

        documents.reverse();
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_vote(&self, vote: VoteEntity) -> MongoResult<()> {
        let key = vote_doc_key(&vote.room_id, &vote.user_id);
        let (room_id, user_id) = (vote.room_id.clone(), vote.user_id.clone());
        let document: MongoVoteDocument = vote.into();
        self.votes()
            .await
            .replace_one(doc_id(&key), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::WriteVote {
                room_id,
                user_id,
                source,
            })?;
        Ok(())
    }

    async fn delete_vote(&self, room_id: String, user_id: String) -> MongoResult<bool> {
        let key = vote_doc_key(&room_id, &user_id);
        let result = self
            .votes()
            .await
            .delete_one(doc_id(&key))
            .await
            .map_err(|source| MongoDaoError::WriteVote {
                room_id,
                user_id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_votes(&self, room_id: String) -> MongoResult<Vec<VoteEntity>> {
        let documents: Vec<MongoVoteDocument> = self
            .votes()
            .await
            .find(doc! { "room_id": room_id.as_str() })
            .sort(doc! { "user_id": 1 })
            .await
            .map_err(|source| MongoDaoError::ListVotes {
                room_id: room_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListVotes { room_id, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl RoomStore for MongoRoomStore {
    fn find_room(&self, room_id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(room_id).await.map_err(Into::into) })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_room(room).await.map_err(Into::into) })
    }

    fn append_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_message(message).await.map_err(Into::into) })
    }

    fn list_messages(
        &self,
        room_id: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_messages(room_id, limit).await.map_err(Into::into) })
    }

    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_vote(vote).await.map_err(Into::into) })
    }

    fn delete_vote(
        &self,
        room_id: String,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_vote(room_id, user_id).await.map_err(Into::into) })
    }

    fn list_votes(&self, room_id: String) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_votes(room_id).await.map_err(Into::into) })
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
