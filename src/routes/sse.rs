use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/rooms/{room_id}",
    tag = "sse",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses((status = 200, description = "Room change feed; the first event is the current snapshot", content_type = "text/event-stream", body = String))
)]
/// Stream full room snapshots, chat, votes, presence and phase changes.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, snapshot) = sse_service::subscribe_room(&state, &room_id).await?;
    info!(room_id, "new room SSE connection");
    Ok(sse_service::to_sse_stream(
        receiver,
        vec![snapshot],
        StreamKind::Room { state, room_id },
    ))
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses(
        (status = 200, description = "Admin SSE stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Another admin stream is open")
    )
)]
/// Stream admin-only events, handing out the admin token first.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, token) = sse_service::subscribe_admin(&state).await?;
    info!("new admin SSE connection");
    sse_service::broadcast_admin_handshake(state.admin_sse(), &token);
    Ok(sse_service::to_sse_stream(
        receiver,
        Vec::new(),
        StreamKind::Admin(state),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/rooms/{room_id}", get(room_stream))
        .route("/sse/admin", get(admin_stream))
}
