use std::time::SystemTime;

use mongodb::bson::{Bson, DateTime, Document, doc};
use serde::{Deserialize, Deserializer, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::dao::models::{MessageEntity, RoomEntity, VoteEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    room_id: String,
    #[serde(default, deserialize_with = "lenient_is_live")]
    is_live: bool,
    #[serde(default, deserialize_with = "lenient_started_at")]
    started_at: Option<DateTime>,
    updated_at: DateTime,
}

fn lenient_is_live<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(
        Option::<Bson>::deserialize(deserializer)?,
        Some(Bson::Boolean(true))
    ))
}

fn lenient_started_at<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime>, D::Error> {
    Ok(started_at_from_bson(Option::<Bson>::deserialize(deserializer)?))
}

/// Native dates and RFC 3339 strings are accepted; anything else means no session.
fn started_at_from_bson(raw: Option<Bson>) -> Option<DateTime> {
    match raw? {
        Bson::DateTime(value) => Some(value),
        Bson::String(value) => OffsetDateTime::parse(&value, &Rfc3339)
            .ok()
            .map(to_bson_datetime),
        _ => None,
    }
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            room_id: value.room_id,
            is_live: value.is_live,
            started_at: value.started_at.map(to_bson_datetime),
            updated_at: to_bson_datetime(value.updated_at),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            room_id: value.room_id,
            is_live: value.is_live,
            started_at: value.started_at.map(from_bson_datetime),
            updated_at: from_bson_datetime(value.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessageDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    room_id: String,
    display_name: String,
    body: String,
    created_at: DateTime,
}

impl From<MessageEntity> for MongoMessageDocument {
    fn from(value: MessageEntity) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            display_name: value.display_name,
            body: value.body,
            created_at: to_bson_datetime(value.created_at),
        }
    }
}

impl From<MongoMessageDocument> for MessageEntity {
    fn from(value: MongoMessageDocument) -> Self {
        Self {
            id: value.id,
            room_id: value.room_id,
            display_name: value.display_name,
            body: value.body,
            created_at: from_bson_datetime(value.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    #[serde(rename = "_id")]
    id: String,
    room_id: String,
    user_id: String,
    album_id: String,
    updated_at: DateTime,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            id: vote_doc_key(&value.room_id, &value.user_id),
            room_id: value.room_id,
            user_id: value.user_id,
            album_id: value.album_id,
            updated_at: to_bson_datetime(value.updated_at),
        }
    }
}

impl From<MongoVoteDocument> for VoteEntity {
    fn from(value: MongoVoteDocument) -> Self {
        Self {
            room_id: value.room_id,
            user_id: value.user_id,
            album_id: value.album_id,
            updated_at: from_bson_datetime(value.updated_at),
        }
    }
}

/// One vote document per user and room, so an upsert replaces the previous vote.
pub fn vote_doc_key(room_id: &str, user_id: &str) -> String {
    format!("{room_id}:{user_id}")
}

pub fn doc_id(id: &str) -> Document {
    doc! { "_id": id }
}

fn to_bson_datetime(value: OffsetDateTime) -> DateTime {
    DateTime::from_system_time(SystemTime::from(value))
}

fn from_bson_datetime(value: DateTime) -> OffsetDateTime {
    OffsetDateTime::from(value.to_system_time())
}
