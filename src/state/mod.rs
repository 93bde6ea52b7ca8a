pub mod clock;
pub mod phase;
pub mod room;
pub mod session;
mod sse;
pub mod tracklist;
pub mod transitions;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::{
    sync::{Mutex, RwLock, broadcast, watch},
    task::JoinHandle,
    time::timeout,
};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::{models::RoomEntity, room_store::RoomStore},
    dto::sse::ServerEvent,
    error::ServiceError,
};

pub use self::sse::SseHub;
use self::{
    clock::{Clock, SystemClock},
    room::RoomPlaybackState,
    sse::SseState,
};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pending promotion of a scheduled session to a live one.
pub struct ScheduledPromotion {
    /// Identifies the task so it only ever unregisters itself.
    pub generation: u64,
    /// Scheduled start the task was spawned for.
    pub at: OffsetDateTime,
    pub task: JoinHandle<()>,
}

/// Central application state: storage handle, per-room caches, feeds and background tasks.
pub struct AppState {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    sse: SseState,
    rooms: DashMap<String, RoomPlaybackState>,
    pauses: DashMap<String, f64>,
    promotions: DashMap<String, ScheduledPromotion>,
    tickers: DashMap<String, JoinHandle<()>>,
    degraded: watch::Sender<bool>,
    write_gate: Mutex<()>,
    write_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit clock.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            clock,
            room_store: RwLock::new(None),
            sse: SseState::new(64, 16),
            rooms: DashMap::new(),
            pauses: DashMap::new(),
            promotions: DashMap::new(),
            tickers: DashMap::new(),
            degraded: degraded_tx,
            write_gate: Mutex::new(()),
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current instant according to the server clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        self.room_store.read().await.as_ref().cloned()
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            if value {
                warn!("entering degraded mode");
            } else {
                info!("leaving degraded mode");
            }
        }
    }

    /// Store handle for operations that need the backend, failing fast in degraded mode.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Subscribe to a room's change feed.
    pub fn subscribe_room(&self, room_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.sse.subscribe_room(room_id)
    }

    /// Forget a room feed once its last subscriber left.
    pub fn release_room_feed(&self, room_id: &str) -> bool {
        self.sse.release_room(room_id)
    }

    /// Hub of a room's change feed, only if one exists already.
    pub fn existing_room_sse(&self, room_id: &str) -> Option<Arc<SseHub>> {
        self.sse.existing_room(room_id)
    }

    /// Hubs of every room feed opened since startup.
    pub fn room_hubs(&self) -> Vec<Arc<SseHub>> {
        self.sse.all_rooms()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin().token()
    }

    /// Last known playback record of a room.
    pub fn cached_room(&self, room_id: &str) -> Option<RoomPlaybackState> {
        self.rooms.get(room_id).map(|room| *room)
    }

    /// The default room plus every room whose record was read or written since startup.
    pub fn known_room_ids(&self) -> Vec<String> {
        let mut ids = vec![self.config.default_room().to_string()];
        ids.extend(
            self.rooms
                .iter()
                .map(|entry| entry.key().clone())
                .filter(|id| id != self.config.default_room()),
        );
        ids
    }

    /// Remember the latest playback record read from or written to the store.
    ///
    /// Idle records are not kept: a missing entry already reads back as idle.
    pub fn cache_room(&self, room_id: &str, playback: RoomPlaybackState) {
        if playback.is_reset() {
            self.rooms.remove(room_id);
        } else {
            self.rooms.insert(room_id.to_string(), playback);
        }
    }

    /// Elapsed values recorded by the admin's pause, keyed by room.
    pub fn pauses(&self) -> &DashMap<String, f64> {
        &self.pauses
    }

    /// Pending schedule promotions keyed by room.
    pub fn promotions(&self) -> &DashMap<String, ScheduledPromotion> {
        &self.promotions
    }

    /// Running phase tickers keyed by room.
    pub fn tickers(&self) -> &DashMap<String, JoinHandle<()>> {
        &self.tickers
    }

    /// Run `work` under the single write gate, bounded by the write timeout.
    pub async fn run_write<F, Fut, T>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let _gate = self.write_gate.lock().await;
        match self.write_timeout {
            Some(limit) => timeout(limit, work())
                .await
                .map_err(|_| ServiceError::Timeout)?,
            None => work().await,
        }
    }

    /// Persist a new playback record for `room_id` and refresh the cache.
    ///
    /// The record fully replaces the previous one; concurrent writers in other processes are
    /// last-write-wins.
    pub async fn write_room(
        &self,
        room_id: &str,
        playback: RoomPlaybackState,
    ) -> Result<RoomPlaybackState, ServiceError> {
        self.run_write(|| async {
            let store = self.require_room_store().await?;
            let entity = RoomEntity::from_playback(room_id, playback, self.now());
            store.save_room(entity).await?;
            self.cache_room(room_id, playback);
            Ok(playback)
        })
        .await
    }
}
