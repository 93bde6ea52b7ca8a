use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::state::room::RoomPlaybackState;

/// Full playback record of a room, as fetched or pushed on the change feed.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: String,
    /// Whether a session is active; false for a schedule that has not been promoted yet.
    pub is_live: bool,
    /// Instant of audio position zero (RFC 3339), absent when no session exists.
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub started_at: Option<OffsetDateTime>,
    /// Live subscribers of the room feed.
    pub presence: usize,
    /// True when the record comes from the cache because storage is unreachable.
    pub stale: bool,
}

impl RoomSnapshot {
    pub fn new(room_id: &str, playback: RoomPlaybackState, presence: usize, stale: bool) -> Self {
        Self {
            room_id: room_id.to_string(),
            is_live: playback.is_live,
            started_at: playback.started_at,
            presence,
            stale,
        }
    }

    pub fn playback(&self) -> RoomPlaybackState {
        RoomPlaybackState {
            is_live: self.is_live,
            started_at: self.started_at,
        }
    }
}
