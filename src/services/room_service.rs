//! Read side of the room record: snapshot fetch and server-derived phase.

use tracing::{debug, warn};

use crate::{
    dto::{common::RoomSnapshot, phase::PhaseView, validation::validate_slug},
    error::ServiceError,
    services::{scheduler, sse_events},
    state::{SharedState, phase::derive, room::RoomPlaybackState},
};

/// Reject room ids that cannot be used as storage keys.
pub fn ensure_room_id(room_id: &str) -> Result<(), ServiceError> {
    validate_slug(room_id).map_err(|err| {
        ServiceError::InvalidInput(format!(
            "invalid room id `{room_id}`: {}",
            err.message.unwrap_or_default()
        ))
    })
}

/// Current playback record of a room and whether it had to come from the cache.
///
/// Storage failures never surface here: the last known record (or an idle room) is returned
/// with the stale flag set so clients keep rendering their last phase.
pub async fn load_playback(
    state: &SharedState,
    room_id: &str,
) -> Result<(RoomPlaybackState, bool), ServiceError> {
    ensure_room_id(room_id)?;

    match read_from_store(state, room_id).await {
        Ok(playback) => {
            state.cache_room(room_id, playback);
            Ok((playback, false))
        }
        Err(err) if err.is_storage_failure() => {
            warn!(room_id, error = %err, "serving cached room state");
            Ok((state.cached_room(room_id).unwrap_or_default(), true))
        }
        Err(err) => Err(err),
    }
}

async fn read_from_store(
    state: &SharedState,
    room_id: &str,
) -> Result<RoomPlaybackState, ServiceError> {
    let store = state.require_room_store().await?;
    let entity = store.find_room(room_id.to_string()).await?;
    if entity.is_none() {
        debug!(room_id, "room has no record yet; treating as idle");
    }
    Ok(entity.map(|room| room.playback()).unwrap_or_default())
}

/// Snapshot returned by the fetch endpoint and sent first on every room feed.
pub async fn load_snapshot(state: &SharedState, room_id: &str) -> Result<RoomSnapshot, ServiceError> {
    let (playback, stale) = load_playback(state, room_id).await?;
    if !stale {
        scheduler::ensure_promotion(state, room_id, &playback);
    }
    Ok(RoomSnapshot::new(
        room_id,
        playback,
        sse_events::presence(state, room_id),
        stale,
    ))
}

/// Phase of the room derived with the server clock.
pub async fn phase_view(state: &SharedState, room_id: &str) -> Result<PhaseView, ServiceError> {
    let (playback, _) = load_playback(state, room_id).await?;
    Ok(derive_view(state, room_id, &playback))
}

/// Derive the phase view of `playback` at the current server instant.
pub fn derive_view(state: &SharedState, room_id: &str, playback: &RoomPlaybackState) -> PhaseView {
    let config = state.config();
    let derived = derive(playback, state.now(), &config.phase_config());
    PhaseView::new(room_id, &derived, config.tracklist())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::RoomEntity, room_store::{RoomStore, memory::MemoryRoomStore}},
        dto::phase::VisiblePhase,
        state::{AppState, clock::ManualClock},
    };

    async fn state_with_store() -> (SharedState, MemoryRoomStore) {
        let clock = ManualClock::new(datetime!(2026-10-17 19:00 UTC));
        let state = AppState::with_clock(AppConfig::default(), Arc::new(clock));
        let store = MemoryRoomStore::new();
        state.set_room_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn unknown_rooms_read_as_idle() {
        let (state, _) = state_with_store().await;
        let snapshot = load_snapshot(&state, "main").await.unwrap();
        assert!(!snapshot.is_live);
        assert_eq!(snapshot.started_at, None);
        assert!(!snapshot.stale);
    }

    #[tokio::test]
    async fn outages_serve_the_cached_record_as_stale() {
        let (state, store) = state_with_store().await;
        let playback = RoomPlaybackState::live_at(datetime!(2026-10-17 18:55 UTC));
        store
            .save_room(RoomEntity::from_playback("main", playback, state.now()))
            .await
            .unwrap();
        load_snapshot(&state, "main").await.unwrap();

        store.set_offline(true);
        let snapshot = load_snapshot(&state, "main").await.unwrap();
        assert!(snapshot.stale);
        assert_eq!(snapshot.playback(), playback);
    }

    #[tokio::test]
    async fn unusable_stored_starts_read_as_a_fresh_idle_room() {
        let (state, store) = state_with_store().await;
        state.cache_room("main", RoomPlaybackState::live_at(datetime!(2026-10-17 18:55 UTC)));

        store.put_raw_room(serde_json::json!({
            "room_id": "main",
            "is_live": true,
            "started_at": "tonight-ish",
            "updated_at": "2026-10-17T19:00:00Z",
        }));
        let snapshot = load_snapshot(&state, "main").await.unwrap();
        assert!(!snapshot.stale);
        assert!(snapshot.playback().is_reset());

        store.put_raw_room(serde_json::json!({ "room_id": "main", "is_live": true }));
        let snapshot = load_snapshot(&state, "main").await.unwrap();
        assert!(!snapshot.stale);
        assert!(snapshot.playback().is_reset());
        assert_eq!(
            phase_view(&state, "main").await.unwrap().phase,
            VisiblePhase::Waiting
        );
    }

    #[tokio::test]
    async fn late_joiners_see_the_live_position() {
        let (state, store) = state_with_store().await;
        let playback = RoomPlaybackState::live_at(datetime!(2026-10-17 18:53:20 UTC));
        store
            .save_room(RoomEntity::from_playback("main", playback, state.now()))
            .await
            .unwrap();

        let view = phase_view(&state, "main").await.unwrap();
        assert_eq!(view.phase, VisiblePhase::Live);
        assert_eq!(view.elapsed_seconds, 400.0);
        assert_eq!(view.track.unwrap().index, 2);
    }

    #[tokio::test]
    async fn malformed_room_ids_are_rejected() {
        let (state, _) = state_with_store().await;
        assert!(matches!(
            load_snapshot(&state, "room::main").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
