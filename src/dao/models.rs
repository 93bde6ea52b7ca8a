use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::room::{RoomPlaybackState, parse_is_live, parse_started_at};

/// Persisted playback record of a room.
///
/// Reads never fail on the playback fields: a malformed or missing value decodes as
/// "no session" so a hand-edited row cannot wedge the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntity {
    pub room_id: String,
    #[serde(default, deserialize_with = "lenient_is_live")]
    pub is_live: bool,
    #[serde(
        default,
        serialize_with = "time::serde::rfc3339::option::serialize",
        deserialize_with = "lenient_started_at"
    )]
    pub started_at: Option<OffsetDateTime>,
    #[serde(
        default = "unknown_update",
        serialize_with = "time::serde::rfc3339::serialize",
        deserialize_with = "lenient_updated_at"
    )]
    pub updated_at: OffsetDateTime,
}

fn lenient_is_live<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(parse_is_live(raw.as_ref()))
}

fn lenient_started_at<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(parse_started_at(raw.as_ref()))
}

fn lenient_updated_at<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<OffsetDateTime, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(parse_started_at(raw.as_ref()).unwrap_or_else(unknown_update))
}

fn unknown_update() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

impl RoomEntity {
    /// Build the record written for `room_id` at `updated_at`.
    pub fn from_playback(
        room_id: impl Into<String>,
        playback: RoomPlaybackState,
        updated_at: OffsetDateTime,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            is_live: playback.is_live,
            started_at: playback.started_at,
            updated_at,
        }
    }

    /// Playback fields of the record. Without a usable start the room holds no session.
    pub fn playback(&self) -> RoomPlaybackState {
        match self.started_at {
            Some(_) => RoomPlaybackState {
                is_live: self.is_live,
                started_at: self.started_at,
            },
            None => RoomPlaybackState::idle(),
        }
    }
}

/// Persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    pub id: Uuid,
    pub room_id: String,
    pub display_name: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Persisted lobby vote. At most one per `(room_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEntity {
    pub room_id: String,
    pub user_id: String,
    pub album_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
