use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{MessageEntity, RoomEntity, VoteEntity};

pub const ROOM_PREFIX: &str = "room::";
pub const MESSAGE_PREFIX: &str = "message::";
pub const VOTE_PREFIX: &str = "vote::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Minimal view of any document, used to read its current revision.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomEntity,
}

impl CouchRoomDocument {
    pub fn from_entity(room: RoomEntity) -> Self {
        Self {
            id: room_doc_id(&room.room_id),
            rev: None,
            room,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchMessageDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub message: MessageEntity,
}

impl CouchMessageDocument {
    pub fn from_entity(message: MessageEntity) -> Self {
        Self {
            id: message_doc_id(&message.room_id, message.created_at, message.id),
            rev: None,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchVoteDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub vote: VoteEntity,
}

impl CouchVoteDocument {
    pub fn from_entity(vote: VoteEntity) -> Self {
        Self {
            id: vote_doc_id(&vote.room_id, &vote.user_id),
            rev: None,
            vote,
        }
    }
}

pub fn room_doc_id(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}")
}

pub fn message_prefix(room_id: &str) -> String {
    format!("{MESSAGE_PREFIX}{room_id}::")
}

/// Message ids sort by creation time within a room: `_all_docs` key order is insertion order.
pub fn message_doc_id(room_id: &str, created_at: OffsetDateTime, id: Uuid) -> String {
    let millis = (created_at.unix_timestamp_nanos() / 1_000_000).max(0);
    format!("{}{millis:020}::{}", message_prefix(room_id), id.simple())
}

pub fn vote_prefix(room_id: &str) -> String {
    format!("{VOTE_PREFIX}{room_id}::")
}

pub fn vote_doc_id(room_id: &str, user_id: &str) -> String {
    format!("{}{user_id}", vote_prefix(room_id))
}
