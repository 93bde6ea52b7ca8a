//! Promotion of scheduled sessions to live ones.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    error::ServiceError,
    services::{room_service, sse_events},
    state::{
        ScheduledPromotion, SharedState, room::RoomPlaybackState,
        transitions::write_room_with_broadcast,
    },
};

const RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Arm the promotion of `room_id` for `at`, replacing any pending one.
pub fn spawn_promotion(state: &SharedState, room_id: &str, at: OffsetDateTime) {
    cancel_promotion(state, room_id);
    let pending = arm(state, room_id, at);
    state.promotions().insert(room_id.to_string(), pending);
}

/// Arm a promotion for a scheduled `playback` read from storage, unless one is pending.
///
/// Covers schedules written before a restart, or by another process.
pub fn ensure_promotion(state: &SharedState, room_id: &str, playback: &RoomPlaybackState) {
    let Some(at) = playback.started_at.filter(|_| !playback.is_live) else {
        return;
    };
    if let Entry::Vacant(slot) = state.promotions().entry(room_id.to_string()) {
        info!(room_id, %at, "re-arming promotion of a stored schedule");
        slot.insert(arm(state, room_id, at));
    }
}

/// Re-arm promotions of every room this process knows about, after a store was installed.
pub async fn rearm_known_rooms(state: &SharedState) {
    for room_id in state.known_room_ids() {
        match room_service::load_playback(state, &room_id).await {
            Ok((playback, false)) => ensure_promotion(state, &room_id, &playback),
            Ok((_, true)) => debug!(room_id, "skipping re-arm of an unreadable room"),
            Err(err) => warn!(room_id, error = %err, "cannot re-arm promotion"),
        }
    }
}

/// Spawn the task promoting `room_id` at `at`. Storage failures are retried with backoff
/// for as long as the task stays registered.
fn arm(state: &SharedState, room_id: &str, at: OffsetDateTime) -> ScheduledPromotion {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    let delay = Duration::try_from(at - state.now()).unwrap_or_default();
    let task_state = state.clone();
    let task_room = room_id.to_string();

    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let mut retry = RETRY_INITIAL_DELAY;
        loop {
            match promote_if_due(&task_state, &task_room, at).await {
                Ok(true) => break,
                Ok(false) => {
                    debug!(room_id = %task_room, "schedule changed before promotion");
                    break;
                }
                Err(err) if err.is_storage_failure() => {
                    warn!(
                        room_id = %task_room,
                        error = %err,
                        ?retry,
                        "scheduled promotion failed; retrying"
                    );
                    tokio::time::sleep(retry).await;
                    retry = (retry * 2).min(RETRY_MAX_DELAY);
                }
                Err(err) => {
                    warn!(room_id = %task_room, error = %err, "scheduled promotion failed");
                    break;
                }
            }
        }

        task_state
            .promotions()
            .remove_if(&task_room, |_, pending| pending.generation == generation);
    });

    debug!(room_id, %at, generation, "promotion armed");
    ScheduledPromotion {
        generation,
        at,
        task,
    }
}

/// Abort the pending promotion of `room_id`, if any.
pub fn cancel_promotion(state: &SharedState, room_id: &str) {
    if let Some((_, pending)) = state.promotions().remove(room_id) {
        pending.task.abort();
        debug!(room_id, at = %pending.at, "promotion cancelled");
    }
}

/// Scheduled start of the pending promotion of `room_id`.
pub fn pending_promotion(state: &SharedState, room_id: &str) -> Option<OffsetDateTime> {
    state
        .promotions()
        .get(room_id)
        .filter(|pending| !pending.task.is_finished())
        .map(|pending| pending.at)
}

/// Flip the room to live if it still holds the schedule for `at`.
///
/// The start instant is kept as scheduled: clients have been counting down to it and some may
/// already be playing. Returns whether a write happened.
pub async fn promote_if_due(
    state: &SharedState,
    room_id: &str,
    at: OffsetDateTime,
) -> Result<bool, ServiceError> {
    let (current, stale) = room_service::load_playback(state, room_id).await?;
    if stale {
        return Err(ServiceError::Degraded);
    }
    if current != RoomPlaybackState::scheduled_at(at) {
        return Ok(false);
    }

    write_room_with_broadcast(state, room_id, RoomPlaybackState::live_at(at)).await?;
    info!(room_id, started_at = %at, "scheduled session promoted to live");
    sse_events::broadcast_schedule_promoted(state, room_id, at);
    Ok(true)
}
