use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::models::MessageEntity,
    dto::chat::{ChatMessage, PostMessageRequest},
    error::ServiceError,
    services::{room_service, sse_events},
    state::SharedState,
};

/// Append a message to the room's chat log and push it to the room feed.
pub async fn post_message(
    state: &SharedState,
    room_id: &str,
    request: PostMessageRequest,
) -> Result<ChatMessage, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    let display_name = request.display_name.trim();
    let body = request.body.trim();
    if display_name.is_empty() || body.is_empty() {
        return Err(ServiceError::InvalidInput(
            "display name and message must not be blank".into(),
        ));
    }

    let store = state.require_room_store().await?;
    let entity = MessageEntity {
        id: Uuid::new_v4(),
        room_id: room_id.to_string(),
        display_name: display_name.to_string(),
        body: body.to_string(),
        created_at: state.now(),
    };
    store.append_message(entity.clone()).await?;
    debug!(room_id, message_id = %entity.id, "chat message stored");

    let message = ChatMessage::from(entity);
    sse_events::broadcast_chat_message(state, &message);
    Ok(message)
}

/// Most recent messages of the room, oldest first.
pub async fn recent_messages(
    state: &SharedState,
    room_id: &str,
) -> Result<Vec<ChatMessage>, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    let store = state.require_room_store().await?;
    let messages = store
        .list_messages(room_id.to_string(), state.config().chat_history_limit())
        .await?;
    Ok(messages.into_iter().map(ChatMessage::from).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::room_store::memory::MemoryRoomStore,
        services::sse_events::EVENT_CHAT_MESSAGE,
        state::{AppState, clock::ManualClock},
    };

    fn request(name: &str, body: &str) -> PostMessageRequest {
        PostMessageRequest {
            display_name: name.into(),
            body: body.into(),
        }
    }

    #[tokio::test]
    async fn messages_are_trimmed_stamped_and_pushed() {
        let clock = ManualClock::new(datetime!(2026-10-17 20:01 UTC));
        let state = AppState::with_clock(AppConfig::default(), Arc::new(clock));
        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
        let mut rx = state.subscribe_room("main");

        let message = post_message(&state, "main", request("  kev ", " feels like we only go backwards\n"))
            .await
            .unwrap();
        assert_eq!(message.display_name, "kev");
        assert_eq!(message.body, "feels like we only go backwards");
        assert_eq!(message.created_at, datetime!(2026-10-17 20:01 UTC));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_CHAT_MESSAGE));

        let history = recent_messages(&state, "main").await.unwrap();
        assert_eq!(history, vec![message]);
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let state = AppState::new(AppConfig::default());
        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
        assert!(matches!(
            post_message(&state, "main", request("kev", "   ")).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn chat_needs_storage() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            recent_messages(&state, "main").await,
            Err(ServiceError::Degraded)
        ));
    }
}
