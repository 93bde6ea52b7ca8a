//! Per-room ticker pushing server-derived phase transitions to display-only clients.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::{
    dto::phase::VisiblePhase,
    services::{room_service, sse_events},
    state::SharedState,
};

const TICK: Duration = Duration::from_secs(1);

/// Make sure a ticker runs for `room_id` while the room feed has subscribers.
pub fn ensure(state: &SharedState, room_id: &str) {
    let Some(hub) = state.existing_room_sse(room_id) else {
        return;
    };
    if hub.subscriber_count() == 0 {
        return;
    }

    if let Entry::Vacant(slot) = state.tickers().entry(room_id.to_string()) {
        debug!(room_id, "starting phase ticker");
        slot.insert(tokio::spawn(run(state.clone(), room_id.to_string())));
    }
}

async fn run(state: SharedState, room_id: String) {
    let mut ticks = interval(TICK);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<VisiblePhase> = None;

    loop {
        ticks.tick().await;

        // The entry is only dropped under the map lock, so a subscriber arriving concurrently
        // either keeps this ticker alive or spawns a fresh one.
        let idle = state
            .tickers()
            .remove_if(&room_id, |_, _| sse_events::presence(&state, &room_id) == 0)
            .is_some();
        if idle {
            debug!(room_id, "stopping phase ticker; no subscribers left");
            break;
        }

        let playback = state.cached_room(&room_id).unwrap_or_default();
        let view = room_service::derive_view(&state, &room_id, &playback);
        let phase = view.phase;
        if last != Some(phase) {
            if let Some(previous) = last {
                debug!(room_id, ?previous, current = ?phase, "room phase changed");
            }
            sse_events::broadcast_phase_changed(&state, &view);
            last = Some(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig,
        state::{AppState, clock::ManualClock, room::RoomPlaybackState},
    };

    fn phase_of(event: &crate::dto::sse::ServerEvent) -> String {
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        body["phase"].as_str().unwrap().to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_transitions_as_the_clock_moves() {
        let clock = ManualClock::new(datetime!(2026-10-17 19:00 UTC));
        let state = AppState::with_clock(AppConfig::default(), Arc::new(clock.clone()));
        state.cache_room(
            "main",
            RoomPlaybackState::scheduled_at(datetime!(2026-10-17 19:01 UTC)),
        );
        let mut rx = state.subscribe_room("main");

        ensure(&state, "main");
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event.as_deref(), Some(sse_events::EVENT_PHASE_CHANGED));
        assert_eq!(phase_of(&first), "waiting");

        clock.advance(time::Duration::seconds(45));
        assert_eq!(phase_of(&rx.recv().await.unwrap()), "entering");

        clock.advance(time::Duration::seconds(20));
        assert_eq!(phase_of(&rx.recv().await.unwrap()), "live");
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_the_last_subscriber_leaves() {
        let state = AppState::new(AppConfig::default());
        let rx = state.subscribe_room("main");
        ensure(&state, "main");
        assert!(state.tickers().contains_key("main"));

        drop(rx);
        tokio::time::sleep(TICK * 3).await;
        assert!(!state.tickers().contains_key("main"));
    }

    #[tokio::test]
    async fn does_not_start_without_subscribers() {
        let state = AppState::new(AppConfig::default());
        ensure(&state, "main");
        drop(state.subscribe_room("main"));
        ensure(&state, "main");
        assert!(!state.tickers().contains_key("main"));
    }
}
