/// Admin triggers: start, schedule, pause, resume and stop.
pub mod admin_service;
/// Chat log of a room.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Server-side phase derivation pushed on room feeds.
pub mod phase_ticker;
/// Snapshot reads and derived phase of a room.
pub mod room_service;
/// Promotion of scheduled sessions.
pub mod scheduler;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
/// Lobby vote tally.
pub mod vote_service;
