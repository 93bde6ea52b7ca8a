//! Business logic powering the admin REST routes. Every trigger ends in a single write of the
//! room record; pause is the exception and only records where the room stopped.

use tracing::info;

use crate::{
    dto::{admin::PauseResponse, common::RoomSnapshot},
    error::ServiceError,
    services::{room_service, scheduler, sse_events},
    state::{
        SharedState,
        phase::{LocalPhase, derive},
        room::RoomPlaybackState,
        transitions::write_room_with_broadcast,
    },
};

fn snapshot(state: &SharedState, room_id: &str, playback: RoomPlaybackState) -> RoomSnapshot {
    RoomSnapshot::new(
        room_id,
        playback,
        sse_events::presence(state, room_id),
        false,
    )
}

/// Go live a few seconds from now so every client receives the write before position zero.
pub async fn start_now(state: &SharedState, room_id: &str) -> Result<RoomSnapshot, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    scheduler::cancel_promotion(state, room_id);

    let started_at = state.now() + state.config().start_delay();
    let written =
        write_room_with_broadcast(state, room_id, RoomPlaybackState::live_at(started_at)).await?;
    state.pauses().remove(room_id);

    info!(room_id, %started_at, "session started");
    Ok(snapshot(state, room_id, written))
}

/// Record a future start without going live; a promotion task flips the room when it is due.
pub async fn schedule(
    state: &SharedState,
    room_id: &str,
    delay_minutes: u32,
) -> Result<RoomSnapshot, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    if delay_minutes == 0 {
        return Err(ServiceError::InvalidInput(
            "delay must be at least one minute".into(),
        ));
    }

    let at = state.now() + time::Duration::minutes(i64::from(delay_minutes));
    scheduler::cancel_promotion(state, room_id);
    let written =
        write_room_with_broadcast(state, room_id, RoomPlaybackState::scheduled_at(at)).await?;
    state.pauses().remove(room_id);
    scheduler::spawn_promotion(state, room_id, at);

    info!(room_id, %at, delay_minutes, "session scheduled");
    Ok(snapshot(state, room_id, written))
}

/// Remember the current position of a live room. The shared record is left untouched.
pub async fn pause(state: &SharedState, room_id: &str) -> Result<PauseResponse, ServiceError> {
    let (playback, stale) = room_service::load_playback(state, room_id).await?;
    if stale {
        return Err(ServiceError::Degraded);
    }

    let derived = derive(&playback, state.now(), &state.config().phase_config());
    if derived.phase != LocalPhase::Live {
        return Err(ServiceError::InvalidState(format!(
            "only a live room can be paused (room is {:?})",
            derived.phase
        )));
    }
    if state.pauses().contains_key(room_id) {
        return Err(ServiceError::InvalidState("room is already paused".into()));
    }

    state.pauses().insert(room_id.to_string(), derived.elapsed);
    sse_events::broadcast_playback_paused(state, room_id, derived.elapsed);
    info!(room_id, elapsed = derived.elapsed, "session paused");

    Ok(PauseResponse {
        room_id: room_id.to_string(),
        paused_at_seconds: derived.elapsed,
    })
}

/// Shift `started_at` so the room continues from the paused position.
pub async fn resume(state: &SharedState, room_id: &str) -> Result<RoomSnapshot, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    let (_, paused) = state
        .pauses()
        .remove(room_id)
        .ok_or_else(|| ServiceError::InvalidState("room is not paused".into()))?;

    let started_at = state.now() - time::Duration::seconds_f64(paused);
    match write_room_with_broadcast(state, room_id, RoomPlaybackState::live_at(started_at)).await
    {
        Ok(written) => {
            scheduler::cancel_promotion(state, room_id);
            info!(room_id, elapsed = paused, %started_at, "session resumed");
            Ok(snapshot(state, room_id, written))
        }
        Err(err) => {
            // Keep the pause so the admin can retry.
            state.pauses().insert(room_id.to_string(), paused);
            Err(err)
        }
    }
}

/// Clear the session: every client returns to waiting.
pub async fn stop(state: &SharedState, room_id: &str) -> Result<RoomSnapshot, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    scheduler::cancel_promotion(state, room_id);

    let written = write_room_with_broadcast(state, room_id, RoomPlaybackState::idle()).await?;
    state.pauses().remove(room_id);

    info!(room_id, "session stopped");
    Ok(snapshot(state, room_id, written))
}
