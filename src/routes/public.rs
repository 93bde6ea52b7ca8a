use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::{common::RoomSnapshot, phase::PhaseView, public::AlbumResponse},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Public read-only endpoints exposing room state and the album.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/rooms/{room_id}", get(get_room))
        .route("/public/rooms/{room_id}/phase", get(get_room_phase))
        .route("/public/album", get(get_album))
}

#[utoipa::path(
    get,
    path = "/public/rooms/{room_id}",
    tag = "public",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Current room record", body = RoomSnapshot),
        (status = 400, description = "Malformed room id")
    )
)]
/// Return the current playback record of a room.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::load_snapshot(&state, &room_id).await?))
}

#[utoipa::path(
    get,
    path = "/public/rooms/{room_id}/phase",
    tag = "public",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses((status = 200, description = "Phase derived with the server clock", body = PhaseView))
)]
/// Return the phase, countdown and current track as seen by the server clock.
pub async fn get_room_phase(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<PhaseView>, AppError> {
    Ok(Json(room_service::phase_view(&state, &room_id).await?))
}

#[utoipa::path(
    get,
    path = "/public/album",
    tag = "public",
    responses((status = 200, description = "Featured album and tracklist", body = AlbumResponse))
)]
/// Return the album every room plays.
pub async fn get_album(State(state): State<SharedState>) -> Json<AlbumResponse> {
    Json(AlbumResponse::from(state.config()))
}
