use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for AlbumClub Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::public::get_room,
        crate::routes::public::get_room_phase,
        crate::routes::public::get_album,
        crate::routes::rooms::list_messages,
        crate::routes::rooms::post_message,
        crate::routes::rooms::get_votes,
        crate::routes::rooms::cast_vote,
        crate::routes::rooms::retract_vote,
        crate::routes::sse::room_stream,
        crate::routes::sse::admin_stream,
        crate::routes::admin::start_now,
        crate::routes::admin::schedule,
        crate::routes::admin::pause,
        crate::routes::admin::resume,
        crate::routes::admin::stop,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::common::RoomSnapshot,
            crate::dto::phase::PhaseView,
            crate::dto::phase::VisiblePhase,
            crate::dto::phase::TrackProgress,
            crate::dto::public::AlbumResponse,
            crate::dto::public::TrackSummary,
            crate::dto::chat::PostMessageRequest,
            crate::dto::chat::ChatMessage,
            crate::dto::votes::CastVoteRequest,
            crate::dto::votes::VoteTally,
            crate::dto::votes::AlbumTally,
            crate::dto::admin::ScheduleRequest,
            crate::dto::admin::PauseResponse,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::PresenceEvent,
            crate::dto::sse::PlaybackPausedEvent,
            crate::dto::sse::SchedulePromotedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "public", description = "Room snapshot, derived phase and album"),
        (name = "rooms", description = "Chat and lobby votes"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Session triggers, gated by the admin SSE token"),
    )
)]
pub struct ApiDoc;
