use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::state::{
    phase::{DerivedPhase, LocalPhase, format_countdown},
    tracklist::{TrackPosition, Tracklist, format_clock},
};

/// Listening phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Lobby: nothing within the pre-show window.
    Waiting,
    /// Pre-show ceremony counting down.
    Entering,
    /// Album playing.
    Live,
    /// Album over; waits for an explicit stop.
    Finished,
}

impl From<LocalPhase> for VisiblePhase {
    fn from(value: LocalPhase) -> Self {
        match value {
            LocalPhase::Waiting => VisiblePhase::Waiting,
            LocalPhase::Entering => VisiblePhase::Entering,
            LocalPhase::Live => VisiblePhase::Live,
            LocalPhase::Finished => VisiblePhase::Finished,
        }
    }
}

/// Current track and position within it.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
pub struct TrackProgress {
    pub index: usize,
    pub title: String,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
    /// `m:ss`
    pub elapsed_display: String,
    /// `m:ss`
    pub duration_display: String,
}

impl TrackProgress {
    fn new(tracklist: &Tracklist, position: TrackPosition) -> Self {
        let title = tracklist
            .track(position.index)
            .map(|track| track.title.clone())
            .unwrap_or_default();
        Self {
            index: position.index,
            title,
            elapsed_display: format_clock(position.elapsed),
            duration_display: format_clock(position.duration),
            elapsed_seconds: position.elapsed,
            duration_seconds: position.duration,
            progress: position.progress,
        }
    }
}

/// Phase of a room as derived with the server clock.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq)]
pub struct PhaseView {
    pub room_id: String,
    pub phase: VisiblePhase,
    /// Seconds since the start, clamped to the album duration.
    pub elapsed_seconds: f64,
    /// Instant the countdown runs towards, while waiting or entering.
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub countdown_target: Option<OffsetDateTime>,
    /// Whole seconds left, rounded up.
    pub countdown_seconds: Option<u64>,
    /// `HH:MM:SS`
    pub countdown_display: Option<String>,
    pub track: Option<TrackProgress>,
}

impl PhaseView {
    pub fn new(room_id: &str, derived: &DerivedPhase, tracklist: &Tracklist) -> Self {
        let track = matches!(derived.phase, LocalPhase::Live | LocalPhase::Finished)
            .then(|| TrackProgress::new(tracklist, tracklist.position(derived.elapsed)));
        Self {
            room_id: room_id.to_string(),
            phase: derived.phase.into(),
            elapsed_seconds: derived.elapsed,
            countdown_target: derived.target,
            countdown_seconds: derived.countdown_seconds(),
            countdown_display: derived.countdown.map(format_countdown),
            track,
        }
    }
}
