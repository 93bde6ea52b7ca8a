use serde::Serialize;
use utoipa::ToSchema;

/// Dispatched payload carried across SSE channels.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Sent once on the admin stream; the token authorises the admin REST routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminHandshake {
    pub token: String,
}

/// Broadcast when the backend enters or leaves degraded mode.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatus {
    pub degraded: bool,
}

/// Number of listeners connected to a room feed.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub room_id: String,
    pub listeners: usize,
}

/// Admin-only: the room was paused at the given album position.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlaybackPausedEvent {
    pub room_id: String,
    pub paused_at_seconds: f64,
}

/// Admin-only: a scheduled session was promoted to live.
#[derive(Debug, Serialize, ToSchema)]
pub struct SchedulePromotedEvent {
    pub room_id: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub started_at: time::OffsetDateTime,
}
