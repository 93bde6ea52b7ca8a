use crate::{
    error::ServiceError,
    services::{phase_ticker, sse_events::broadcast_room_snapshot},
    state::{SharedState, room::RoomPlaybackState},
};

/// Persist a room playback record, then push the full snapshot to the room's feed.
///
/// The feed never carries diffs: subscribers receive the whole record and re-derive from it.
pub async fn write_room_with_broadcast(
    state: &SharedState,
    room_id: &str,
    playback: RoomPlaybackState,
) -> Result<RoomPlaybackState, ServiceError> {
    let written = state.write_room(room_id, playback).await?;
    broadcast_room_snapshot(state, room_id, &written);
    phase_ticker::ensure(state, room_id);
    Ok(written)
}
