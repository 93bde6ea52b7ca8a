use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::MessageEntity,
    dto::validation::{validate_display_name, validate_message_body},
};

/// Chat message posted to a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PostMessageRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
    #[validate(custom(function = "validate_message_body"))]
    pub body: String,
}

/// Chat message as listed and pushed on the room feed.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_id: String,
    pub display_name: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

impl From<MessageEntity> for ChatMessage {
    fn from(value: MessageEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            display_name: value.display_name,
            body: value.body,
            created_at: value.created_at,
        }
    }
}
