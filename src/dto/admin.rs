//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request to schedule a session `delay_minutes` from now.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ScheduleRequest {
    /// Minutes until audio position zero, at most one day ahead.
    #[validate(range(min = 1, max = 1440))]
    pub delay_minutes: u32,
}

/// Outcome of an admin pause.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
pub struct PauseResponse {
    pub room_id: String,
    /// Album position the room was paused at.
    pub paused_at_seconds: f64,
}
