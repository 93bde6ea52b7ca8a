use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{PauseResponse, ScheduleRequest},
        common::RoomSnapshot,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Session triggers of a room, reserved to the holder of the admin SSE token.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/rooms/{room_id}/start", post(start_now))
        .route("/admin/rooms/{room_id}/schedule", post(schedule))
        .route("/admin/rooms/{room_id}/pause", post(pause))
        .route("/admin/rooms/{room_id}/resume", post(resume))
        .route("/admin/rooms/{room_id}/stop", post(stop))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Go live after the configured grace delay.
#[utoipa::path(
    post,
    path = "/admin/rooms/{room_id}/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room record written", body = RoomSnapshot),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn start_now(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(admin_service::start_now(&state, &room_id).await?))
}

/// Schedule a session `delay_minutes` from now; it is promoted to live when due.
#[utoipa::path(
    post,
    path = "/admin/rooms/{room_id}/schedule",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("room_id" = String, Path, description = "Room identifier")),
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Schedule written", body = RoomSnapshot),
        (status = 400, description = "Delay out of range")
    )
)]
pub async fn schedule(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<ScheduleRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(
        admin_service::schedule(&state, &room_id, payload.delay_minutes).await?,
    ))
}

/// Record the current position; listeners keep playing until the resume write.
#[utoipa::path(
    post,
    path = "/admin/rooms/{room_id}/pause",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Position recorded", body = PauseResponse),
        (status = 409, description = "Room not live or already paused")
    )
)]
pub async fn pause(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<PauseResponse>, AppError> {
    Ok(Json(admin_service::pause(&state, &room_id).await?))
}

/// Shift the start so the room continues from the paused position.
#[utoipa::path(
    post,
    path = "/admin/rooms/{room_id}/resume",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Shifted record written", body = RoomSnapshot),
        (status = 409, description = "Room not paused")
    )
)]
pub async fn resume(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(admin_service::resume(&state, &room_id).await?))
}

/// Reset the room; every client returns to waiting.
#[utoipa::path(
    post,
    path = "/admin/rooms/{room_id}/stop",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("room_id" = String, Path, description = "Room identifier")),
    responses((status = 200, description = "Room reset", body = RoomSnapshot))
)]
pub async fn stop(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(admin_service::stop(&state, &room_id).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
