use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    rooms: DashMap<String, Arc<SseHub>>,
    room_capacity: usize,
    admin: AdminSseState,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(room_capacity: usize, admin_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            room_capacity,
            admin: AdminSseState::new(admin_capacity),
        }
    }

    /// Subscribe to a room's change feed, creating its hub on first use.
    ///
    /// Runs under the map entry lock so it cannot interleave with [`SseState::release_room`].
    pub fn subscribe_room(&self, room_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(SseHub::new(self.room_capacity)))
            .subscribe()
    }

    /// Drop the hub of a room feed nobody listens to anymore. Returns whether it was removed.
    pub fn release_room(&self, room_id: &str) -> bool {
        self.rooms
            .remove_if(room_id, |_, hub| hub.subscriber_count() == 0)
            .is_some()
    }

    /// Hub of a room's change feed, while it has or just lost subscribers.
    pub fn existing_room(&self, room_id: &str) -> Option<Arc<SseHub>> {
        self.rooms.get(room_id).map(|hub| hub.clone())
    }

    /// Every live room hub.
    pub fn all_rooms(&self) -> Vec<Arc<SseHub>> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Access the admin SSE state bundle containing both hub and token.
    pub fn admin(&self) -> &AdminSseState {
        &self.admin
    }
}

/// State bundle holding the admin SSE hub and its coordinating token.
pub struct AdminSseState {
    hub: SseHub,
    token: Mutex<Option<String>>,
}

impl AdminSseState {
    fn new(capacity: usize) -> Self {
        Self {
            hub: SseHub::new(capacity),
            token: Mutex::new(None),
        }
    }

    /// Borrow the broadcast hub used for admin-only events.
    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    /// Borrow the token mutex that coordinates the single admin connection.
    pub fn token(&self) -> &Mutex<Option<String>> {
        &self.token
    }
}

/// Broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
