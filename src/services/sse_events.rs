use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use crate::{
    dto::{
        chat::ChatMessage,
        common::RoomSnapshot,
        phase::PhaseView,
        sse::{
            PlaybackPausedEvent, PresenceEvent, SchedulePromotedEvent, ServerEvent, SystemStatus,
        },
        votes::VoteTally,
    },
    state::{SharedState, room::RoomPlaybackState},
};

pub const EVENT_ROOM_SNAPSHOT: &str = "room.snapshot";
pub const EVENT_CHAT_MESSAGE: &str = "chat.message";
pub const EVENT_VOTES_TALLY: &str = "votes.tally";
pub const EVENT_PRESENCE: &str = "presence";
pub const EVENT_PHASE_CHANGED: &str = "phase.changed";
pub const EVENT_PLAYBACK_PAUSED: &str = "playback.paused";
pub const EVENT_SCHEDULE_PROMOTED: &str = "schedule.promoted";
pub const EVENT_SYSTEM_STATUS: &str = "system.status";
pub const EVENT_ADMIN_TOKEN: &str = "admin_token";

/// Push the full playback record of a room to its feed.
pub fn broadcast_room_snapshot(state: &SharedState, room_id: &str, playback: &RoomPlaybackState) {
    let presence = presence(state, room_id);
    let snapshot = RoomSnapshot::new(room_id, *playback, presence, false);
    send_room_event(state, room_id, EVENT_ROOM_SNAPSHOT, &snapshot);
}

/// Push a freshly appended chat message.
pub fn broadcast_chat_message(state: &SharedState, message: &ChatMessage) {
    send_room_event(state, &message.room_id, EVENT_CHAT_MESSAGE, message);
}

/// Push the room-wide tally. Personal fields are stripped.
pub fn broadcast_vote_tally(state: &SharedState, tally: &VoteTally) {
    let public = VoteTally {
        your_vote: None,
        ..tally.clone()
    };
    send_room_event(state, &tally.room_id, EVENT_VOTES_TALLY, &public);
}

/// Push the current listener count of a room.
pub fn broadcast_presence(state: &SharedState, room_id: &str) {
    let payload = PresenceEvent {
        room_id: room_id.to_string(),
        listeners: presence(state, room_id),
    };
    send_room_event(state, room_id, EVENT_PRESENCE, &payload);
}

/// Push a server-derived phase transition.
pub fn broadcast_phase_changed(state: &SharedState, view: &PhaseView) {
    send_room_event(state, &view.room_id, EVENT_PHASE_CHANGED, view);
}

/// Tell the admin where the room was paused. Listeners are not told.
pub fn broadcast_playback_paused(state: &SharedState, room_id: &str, paused_at_seconds: f64) {
    let payload = PlaybackPausedEvent {
        room_id: room_id.to_string(),
        paused_at_seconds,
    };
    send_admin_event(state, EVENT_PLAYBACK_PAUSED, &payload);
}

/// Tell the admin a scheduled session went live.
pub fn broadcast_schedule_promoted(state: &SharedState, room_id: &str, started_at: OffsetDateTime) {
    let payload = SchedulePromotedEvent {
        room_id: room_id.to_string(),
        started_at,
    };
    send_admin_event(state, EVENT_SCHEDULE_PROMOTED, &payload);
}

/// Announce degraded mode changes on every feed.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    match ServerEvent::json(Some(EVENT_SYSTEM_STATUS.to_string()), &payload) {
        Ok(event) => {
            for hub in state.room_hubs() {
                hub.broadcast(event.clone());
            }
            state.admin_sse().broadcast(event);
        }
        Err(err) => warn!(error = %err, "failed to serialize system status payload"),
    }
}

/// Listeners currently connected to a room feed.
pub fn presence(state: &SharedState, room_id: &str) -> usize {
    state
        .existing_room_sse(room_id)
        .map_or(0, |hub| hub.subscriber_count())
}

fn send_room_event(state: &SharedState, room_id: &str, event: &str, payload: &impl Serialize) {
    // Nobody ever subscribed: nothing to deliver.
    let Some(hub) = state.existing_room_sse(room_id) else {
        return;
    };
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(room_id, event, error = %err, "failed to serialize room SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn snapshots_reach_room_subscribers_with_presence() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.subscribe_room("main");

        let playback = RoomPlaybackState::live_at(datetime!(2026-10-17 20:00 UTC));
        broadcast_room_snapshot(&state, "main", &playback);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_ROOM_SNAPSHOT));
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["is_live"], true);
        assert_eq!(body["started_at"], "2026-10-17T20:00:00Z");
        assert_eq!(body["presence"], 1);
        assert_eq!(body["stale"], false);
    }

    #[tokio::test]
    async fn rooms_without_feeds_are_skipped() {
        let state = AppState::new(AppConfig::default());
        broadcast_room_snapshot(&state, "nobody", &RoomPlaybackState::idle());
        assert!(state.existing_room_sse("nobody").is_none());
    }

    #[tokio::test]
    async fn tally_broadcasts_hide_the_personal_vote() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.subscribe_room("main");
        let tally = VoteTally {
            room_id: "main".into(),
            albums: Vec::new(),
            total: 0,
            leader: None,
            your_vote: Some("lonerism".into()),
        };

        broadcast_vote_tally(&state, &tally);

        let event = rx.recv().await.unwrap();
        assert!(!event.data.contains("your_vote"));
    }

    #[tokio::test]
    async fn pauses_are_admin_only() {
        let state = AppState::new(AppConfig::default());
        let mut room = state.subscribe_room("main");
        let mut admin = state.admin_sse().subscribe();

        broadcast_playback_paused(&state, "main", 42.0);

        let event = admin.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_PLAYBACK_PAUSED));
        assert!(room.try_recv().is_err());
    }
}
