use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::{
        chat::{ChatMessage, PostMessageRequest},
        votes::{CastVoteRequest, VoteTally, VoterQuery},
    },
    error::AppError,
    services::{chat_service, vote_service},
    state::SharedState,
};

/// Chat and vote endpoints of a room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{room_id}/messages",
            get(list_messages).post(post_message),
        )
        .route(
            "/rooms/{room_id}/votes",
            get(get_votes).post(cast_vote).delete(retract_vote),
        )
}

/// Most recent chat messages, oldest first.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/messages",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses((status = 200, description = "Chat history", body = [ChatMessage]))
)]
pub async fn list_messages(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    Ok(Json(chat_service::recent_messages(&state, &room_id).await?))
}

/// Post a chat message.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/messages",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = ChatMessage),
        (status = 400, description = "Invalid display name or body")
    )
)]
pub async fn post_message(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<PostMessageRequest>>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let message = chat_service::post_message(&state, &room_id, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Vote counts of the room.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/votes",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier"), VoterQuery),
    responses((status = 200, description = "Current tally", body = VoteTally))
)]
pub async fn get_votes(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Query(query)): Valid<Query<VoterQuery>>,
) -> Result<Json<VoteTally>, AppError> {
    let tally = vote_service::current_tally(&state, &room_id, query.user_id.as_deref()).await?;
    Ok(Json(tally))
}

/// Cast or replace a vote.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/votes",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Tally after the vote", body = VoteTally),
        (status = 400, description = "Unknown album")
    )
)]
pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<CastVoteRequest>>,
) -> Result<Json<VoteTally>, AppError> {
    Ok(Json(vote_service::cast_vote(&state, &room_id, payload).await?))
}

/// Withdraw the caller's vote.
#[utoipa::path(
    delete,
    path = "/rooms/{room_id}/votes",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier"), VoterQuery),
    responses(
        (status = 200, description = "Tally after the retraction", body = VoteTally),
        (status = 400, description = "Missing user id"),
        (status = 404, description = "No vote recorded")
    )
)]
pub async fn retract_vote(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Query(query)): Valid<Query<VoterQuery>>,
) -> Result<Json<VoteTally>, AppError> {
    let user_id = query
        .user_id
        .ok_or_else(|| AppError::BadRequest("`user_id` query parameter is required".into()))?;
    Ok(Json(
        vote_service::retract_vote(&state, &room_id, &user_id).await?,
    ))
}
