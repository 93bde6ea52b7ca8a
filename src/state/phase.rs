//! Phase derivation: the pure function every client (and the server feed) runs against the
//! shared room record and its own clock.
//!
//! Nothing here keeps history. Given the same snapshot and the same instant, [`derive`]
//! always returns the same [`DerivedPhase`], which is what lets late joiners, reconnecting
//! clients and duplicate change notifications converge without coordination.

use std::time::Duration;

use time::OffsetDateTime;

use crate::state::room::{RoomPlaybackState, ShowtimeOfDay};

/// The four mutually exclusive phases a client renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalPhase {
    /// No session within reach; lobby is shown.
    Waiting,
    /// Pre-show ceremony counting down to position zero.
    Entering,
    /// Audio position is within the album.
    Live,
    /// Album ran out; terminal until an explicit stop/reset.
    Finished,
}

/// Static inputs of the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Fixed daily showtime used when nothing has been scheduled.
    pub showtime: Option<ShowtimeOfDay>,
    /// Length of the entering ceremony before position zero.
    pub pre_show: Duration,
    /// Album length; elapsed values are clamped to it.
    pub album_duration: Duration,
}

/// Output of [`derive`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedPhase {
    /// Phase to render.
    pub phase: LocalPhase,
    /// Seconds since `started_at`, clamped to `[0, album_duration]`. Zero before the start.
    pub elapsed: f64,
    /// Instant the countdown runs towards, while waiting or entering.
    pub target: Option<OffsetDateTime>,
    /// Time left until `target`.
    pub countdown: Option<Duration>,
}

impl DerivedPhase {
    fn before_start(phase: LocalPhase, target: OffsetDateTime, remaining: Duration) -> Self {
        Self {
            phase,
            elapsed: 0.0,
            target: Some(target),
            countdown: Some(remaining),
        }
    }

    /// Countdown rounded up to whole seconds, as displayed.
    pub fn countdown_seconds(&self) -> Option<u64> {
        self.countdown.map(|left| left.as_secs_f64().ceil() as u64)
    }
}

/// Seconds since `started_at`, never negative.
pub fn elapsed_since(started_at: OffsetDateTime, now: OffsetDateTime) -> f64 {
    (now - started_at).as_seconds_f64().max(0.0)
}

/// Derive the local phase and elapsed value from a room snapshot and the local clock.
pub fn derive(
    room: &RoomPlaybackState,
    now: OffsetDateTime,
    config: &PhaseConfig,
) -> DerivedPhase {
    let album = config.album_duration.as_secs_f64();

    match room.started_at {
        Some(started_at) => {
            let raw = (now - started_at).as_seconds_f64();
            if raw >= album {
                DerivedPhase {
                    phase: LocalPhase::Finished,
                    elapsed: album,
                    target: None,
                    countdown: None,
                }
            } else if raw >= 0.0 {
                DerivedPhase {
                    phase: LocalPhase::Live,
                    elapsed: raw,
                    target: None,
                    countdown: None,
                }
            } else {
                let remaining = Duration::from_secs_f64(-raw);
                // A live write with a future start is the start-now grace window: always a
                // ceremony. A plain schedule only enters once inside the pre-show window.
                let phase = if room.is_live || remaining <= config.pre_show {
                    LocalPhase::Entering
                } else {
                    LocalPhase::Waiting
                };
                DerivedPhase::before_start(phase, started_at, remaining)
            }
        }
        None => match config.showtime {
            Some(showtime) => {
                let target = showtime.next_after(now);
                let remaining = Duration::try_from(target - now).unwrap_or_default();
                let phase = if !remaining.is_zero() && remaining <= config.pre_show {
                    LocalPhase::Entering
                } else {
                    LocalPhase::Waiting
                };
                DerivedPhase::before_start(phase, target, remaining)
            }
            None => DerivedPhase {
                phase: LocalPhase::Waiting,
                elapsed: 0.0,
                target: None,
                countdown: None,
            },
        },
    }
}

/// Which participant is looking at the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Regular participant.
    Listener,
    /// Holder of the start/schedule/stop controls.
    Admin,
}

/// Screen a participant lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Voting lobby with the showtime countdown.
    Lobby,
    /// Listening room (turntable, chat, audio).
    Room,
}

/// Admins skip the lobby and land on the room controls whatever the phase; listeners only
/// leave the lobby once the ceremony begins.
pub fn entry_point(role: Role, phase: LocalPhase) -> EntryPoint {
    match (role, phase) {
        (Role::Admin, _) => EntryPoint::Room,
        (Role::Listener, LocalPhase::Waiting) => EntryPoint::Lobby,
        (Role::Listener, _) => EntryPoint::Room,
    }
}

/// Render a countdown as `HH:MM:SS`.
pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
