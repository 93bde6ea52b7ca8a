use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dto::validation::validate_slug;

/// Vote for one of the lobby albums.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CastVoteRequest {
    /// Per-browser identifier generated by the client.
    #[validate(custom(function = "validate_slug"))]
    pub user_id: String,
    #[validate(custom(function = "validate_slug"))]
    pub album_id: String,
}

/// Identifies the voter on tally reads and retractions.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct VoterQuery {
    #[validate(custom(function = "validate_slug"))]
    pub user_id: Option<String>,
}

/// Count for one album of the catalogue.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct AlbumTally {
    pub album_id: String,
    pub title: String,
    pub artist: String,
    pub year: u16,
    pub votes: usize,
}

/// Vote counts of a room, every catalogue album included.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct VoteTally {
    pub room_id: String,
    /// In catalogue order.
    pub albums: Vec<AlbumTally>,
    pub total: usize,
    /// Album with the most votes; ties go to the earlier catalogue entry.
    pub leader: Option<String>,
    /// Album the requesting user voted for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_vote: Option<String>,
}
