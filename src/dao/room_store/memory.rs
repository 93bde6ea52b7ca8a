//! Process-local [`RoomStore`] used when no database is configured and throughout the tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::dao::{
    models::{MessageEntity, RoomEntity, VoteEntity},
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

/// Raised by every operation while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct MemoryOffline;

/// In-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: DashMap<String, RoomEntity>,
    messages: DashMap<String, Vec<MessageEntity>>,
    votes: DashMap<(String, String), VoteEntity>,
    offline: AtomicBool,
    vote_listing_delay: Mutex<Option<Duration>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every call fails as unavailable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulate a slow read: the next vote listing takes its snapshot, then waits `delay`.
    pub fn delay_next_vote_listing(&self, delay: Duration) {
        if let Ok(mut slot) = self.inner.vote_listing_delay.lock() {
            *slot = Some(delay);
        }
    }

    fn take_vote_listing_delay(&self) -> Option<Duration> {
        self.inner
            .vote_listing_delay
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }

    /// Decode `row` the way document stores do and keep it as the room record.
    #[cfg(test)]
    pub(crate) fn put_raw_room(&self, row: serde_json::Value) {
        let room: RoomEntity = serde_json::from_value(row).expect("room row");
        self.inner.rooms.insert(room.room_id.clone(), room);
    }

    fn check(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                MemoryOffline.to_string(),
                MemoryOffline,
            ))
        } else {
            Ok(())
        }
    }
}

impl RoomStore for MemoryRoomStore {
    fn find_room(&self, room_id: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            Ok(store.inner.rooms.get(&room_id).map(|room| room.clone()))
        })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            store.inner.rooms.insert(room.room_id.clone(), room);
            Ok(())
        })
    }

    fn append_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            let mut messages = store
                .inner
                .messages
                .entry(message.room_id.clone())
                .or_default();
            let at = messages.partition_point(|existing| existing.created_at <= message.created_at);
            messages.insert(at, message);
            Ok(())
        })
    }

    fn list_messages(
        &self,
        room_id: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            let Some(messages) = store.inner.messages.get(&room_id) else {
                return Ok(Vec::new());
            };
            let skip = messages.len().saturating_sub(limit);
            Ok(messages[skip..].to_vec())
        })
    }

    fn save_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            let key = (vote.room_id.clone(), vote.user_id.clone());
            store.inner.votes.insert(key, vote);
            Ok(())
        })
    }

    fn delete_vote(
        &self,
        room_id: String,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            Ok(store.inner.votes.remove(&(room_id, user_id)).is_some())
        })
    }

    fn list_votes(&self, room_id: String) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check()?;
            let mut votes: Vec<VoteEntity> = store
                .inner
                .votes
                .iter()
                .filter(|entry| entry.key().0 == room_id)
                .map(|entry| entry.value().clone())
                .collect();
            votes.sort_by(|a, b| a.user_id.cmp(&b.user_id));
            if let Some(delay) = store.take_vote_listing_delay() {
                tokio::time::sleep(delay).await;
            }
            Ok(votes)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check() })
    }
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::datetime};
    use uuid::Uuid;

    use super::*;
    use crate::state::room::RoomPlaybackState;

    const T0: OffsetDateTime = datetime!(2026-10-17 20:00:00 UTC);

    fn message(room: &str, body: &str, offset: i64) -> MessageEntity {
        MessageEntity {
            id: Uuid::new_v4(),
            room_id: room.into(),
            display_name: "kev".into(),
            body: body.into(),
            created_at: T0 + time::Duration::seconds(offset),
        }
    }

    fn vote(user: &str, album: &str) -> VoteEntity {
        VoteEntity {
            room_id: "main".into(),
            user_id: user.into(),
            album_id: album.into(),
            updated_at: T0,
        }
    }

    #[tokio::test]
    async fn room_writes_replace_the_record() {
        let store = MemoryRoomStore::new();
        assert!(store.find_room("main".into()).await.unwrap().is_none());

        store
            .save_room(RoomEntity::from_playback("main", RoomPlaybackState::live_at(T0), T0))
            .await
            .unwrap();
        store
            .save_room(RoomEntity::from_playback("main", RoomPlaybackState::idle(), T0))
            .await
            .unwrap();

        let room = store.find_room("main".into()).await.unwrap().unwrap();
        assert_eq!(room.playback(), RoomPlaybackState::idle());
    }

    #[tokio::test]
    async fn messages_keep_the_most_recent_in_ascending_order() {
        let store = MemoryRoomStore::new();
        for (offset, body) in [(3, "c"), (1, "a"), (2, "b"), (4, "d")] {
            store.append_message(message("main", body, offset)).await.unwrap();
        }
        store.append_message(message("other", "x", 0)).await.unwrap();

        let listed = store.list_messages("main".into(), 3).await.unwrap();
        let bodies: Vec<_> = listed.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["b", "c", "d"]);
    }

    #[tokio::test]
    async fn second_vote_replaces_the_first() {
        let store = MemoryRoomStore::new();
        store.save_vote(vote("u1", "lonerism")).await.unwrap();
        store.save_vote(vote("u1", "abbey-road")).await.unwrap();
        store.save_vote(vote("u2", "lonerism")).await.unwrap();

        let votes = store.list_votes("main".into()).await.unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].album_id, "abbey-road");

        assert!(store.delete_vote("main".into(), "u1".into()).await.unwrap());
        assert!(!store.delete_vote("main".into(), "u1".into()).await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryRoomStore::new();
        store.set_offline(true);
        assert!(store.health_check().await.is_err());
        assert!(store.find_room("main".into()).await.is_err());

        store.set_offline(false);
        assert!(store.try_reconnect().await.is_ok());
    }
}
