use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{AdminHandshake, ServerEvent},
    error::ServiceError,
    services::{phase_ticker, room_service, sse_events},
    state::{SharedState, SseHub},
};

/// Subscribe to a room's change feed.
///
/// The receiver is registered before the snapshot is read so no write can fall between the
/// two; the snapshot is returned as the first event to deliver.
pub async fn subscribe_room(
    state: &SharedState,
    room_id: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, ServerEvent), ServiceError> {
    room_service::ensure_room_id(room_id)?;
    let receiver = state.subscribe_room(room_id);

    let first = match first_event(state, room_id).await {
        Ok(first) => first,
        Err(err) => {
            drop(receiver);
            state.release_room_feed(room_id);
            return Err(err);
        }
    };

    sse_events::broadcast_presence(state, room_id);
    phase_ticker::ensure(state, room_id);
    Ok((receiver, first))
}

async fn first_event(state: &SharedState, room_id: &str) -> Result<ServerEvent, ServiceError> {
    let snapshot = room_service::load_snapshot(state, room_id).await?;
    ServerEvent::json(Some(sse_events::EVENT_ROOM_SNAPSHOT.to_string()), &snapshot)
        .map_err(|err| ServiceError::InvalidState(format!("snapshot encoding failed: {err}")))
}

/// Subscribe to the admin-only SSE stream.
pub async fn subscribe_admin(
    state: &SharedState,
) -> Result<(broadcast::Receiver<ServerEvent>, String), ServiceError> {
    let token = claim_admin_token(state).await?;
    let receiver = state.admin_sse().subscribe();
    Ok((receiver, token))
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    /// Room feed; teardown publishes the new listener count.
    Room { state: SharedState, room_id: String },
    /// Teardown releases the admin token.
    Admin(SharedState),
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects. `initial` events are sent first.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut open = true;
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                open = false;
                break;
            }
        }

        while open {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Snapshots are idempotent; the next one heals the client.
                            warn!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        // Leave the subscriber count before announcing it.
        drop(receiver);
        match kind {
            StreamKind::Room { state, room_id } => {
                if state.release_room_feed(&room_id) {
                    debug!(room_id, "room feed released");
                } else {
                    sse_events::broadcast_presence(&state, &room_id);
                }
                info!(room_id, "room SSE stream disconnected");
            }
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                info!("admin SSE stream disconnected");
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Reserve the admin token for a new stream, generating one when none exists
/// and failing if another connection already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "Another admin SSE stream is already active".into(),
        )),
    }
}

/// Broadcast a token refresh event to the admin stream.
pub fn broadcast_admin_handshake(hub: &SseHub, token: &str) {
    if let Ok(event) = ServerEvent::json(
        Some(sse_events::EVENT_ADMIN_TOKEN.to_string()),
        &AdminHandshake {
            token: token.to_string(),
        },
    ) {
        hub.broadcast(event);
    }
}

/// Forward degraded mode changes to every open feed until the state is dropped.
pub async fn relay_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        sse_events::broadcast_system_status(&state, degraded);
    }
}

/// Clear any stored admin token so the next admin connection negotiates a
/// fresh credential.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::room_store::memory::MemoryRoomStore, state::AppState,
    };

    #[tokio::test]
    async fn only_one_admin_stream_at_a_time() {
        let state = AppState::new(AppConfig::default());
        let (_rx, token) = subscribe_admin(&state).await.unwrap();
        assert_eq!(token.len(), 32);
        assert!(matches!(
            subscribe_admin(&state).await,
            Err(ServiceError::Unauthorized(_))
        ));

        reset_admin_token(state.clone()).await;
        assert!(subscribe_admin(&state).await.is_ok());
    }

    #[tokio::test]
    async fn room_subscriptions_start_with_the_snapshot() {
        let state = AppState::new(AppConfig::default());
        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
        let mut watcher = state.subscribe_room("main");

        let (_receiver, first) = subscribe_room(&state, "main").await.unwrap();
        assert_eq!(first.event.as_deref(), Some(sse_events::EVENT_ROOM_SNAPSHOT));
        let body: serde_json::Value = serde_json::from_str(&first.data).unwrap();
        assert_eq!(body["presence"], 2);

        let presence = watcher.recv().await.unwrap();
        assert_eq!(presence.event.as_deref(), Some(sse_events::EVENT_PRESENCE));
        assert!(state.tickers().contains_key("main"));
    }

    #[tokio::test]
    async fn closing_the_last_stream_releases_the_room_feed() {
        let state = AppState::new(AppConfig::default());
        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;

        let (receiver, first) = subscribe_room(&state, "drive-by").await.unwrap();
        let sse = to_sse_stream(
            receiver,
            vec![first],
            StreamKind::Room {
                state: state.clone(),
                room_id: "drive-by".into(),
            },
        );
        assert_eq!(sse_events::presence(&state, "drive-by"), 1);

        drop(sse);
        for _ in 0..10 {
            if state.existing_room_sse("drive-by").is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.existing_room_sse("drive-by").is_none());
        assert!(state.room_hubs().is_empty());
        assert!(state.known_room_ids().iter().all(|id| id != "drive-by"));
    }

    #[tokio::test]
    async fn degraded_rooms_still_get_a_stale_snapshot() {
        let state = AppState::new(AppConfig::default());
        let (_receiver, first) = subscribe_room(&state, "main").await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&first.data).unwrap();
        assert_eq!(body["stale"], true);
        assert_eq!(body["is_live"], false);
    }
}
