#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::{
    models::{MessageEntity, RoomEntity, VoteEntity},
    storage::StorageResult,
};

/// Abstraction over the persistence layer for room playback records, chat and votes.
pub trait RoomStore: Send + Sync {
    fn find_room(&self, room_id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Upsert the room record; the write fully replaces the previous one.
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn append_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Most recent `limit` messages of a room, oldest first.
    fn list_messages(
        &self,
        room_id: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>>;
    /// Record a vote, replacing any previous vote of the same user in the room.
    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a user's vote, returning whether one existed.
    fn delete_vote(
        &self,
        room_id: String,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_votes(&self, room_id: String) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
