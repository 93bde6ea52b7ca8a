use serde_json::Value;
use thiserror::Error;
use time::{
    OffsetDateTime, Time, UtcOffset,
    format_description::well_known::Rfc3339,
};

/// Identifier of the room every client joins unless told otherwise.
pub const DEFAULT_ROOM_ID: &str = "main";

/// The single shared fact every client derives its playback from.
///
/// `started_at` is the wall-clock instant that corresponds to audio position zero. It may lie
/// in the future (scheduled or about to start), in the past (playing or finished) or be absent
/// when no session exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomPlaybackState {
    /// Whether a session is active. Stays false for a schedule until it gets promoted.
    pub is_live: bool,
    /// Instant of audio position zero.
    pub started_at: Option<OffsetDateTime>,
}

impl RoomPlaybackState {
    /// Room with no session: what a stop/reset writes.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Live session whose position zero is `started_at`.
    pub fn live_at(started_at: OffsetDateTime) -> Self {
        Self {
            is_live: true,
            started_at: Some(started_at),
        }
    }

    /// Session scheduled for `started_at`, not live yet.
    pub fn scheduled_at(started_at: OffsetDateTime) -> Self {
        Self {
            is_live: false,
            started_at: Some(started_at),
        }
    }

    /// True when neither a session nor a schedule is recorded.
    pub fn is_reset(&self) -> bool {
        !self.is_live && self.started_at.is_none()
    }

    /// Parse a change-feed or snapshot payload without trusting its shape.
    ///
    /// Accepts either the row itself or an envelope carrying it under `new`. Anything other
    /// than a literal `true` for `is_live` reads as false, and a missing or unparsable
    /// `started_at` reads as "no session".
    pub fn from_payload(payload: &Value) -> Self {
        let row = payload.get("new").unwrap_or(payload);
        Self {
            is_live: parse_is_live(row.get("is_live")),
            started_at: parse_started_at(row.get("started_at")),
        }
    }
}

/// Only a literal `true` counts as live.
pub fn parse_is_live(raw: Option<&Value>) -> bool {
    raw.and_then(Value::as_bool).unwrap_or(false)
}

/// RFC 3339 instant, or `None` for anything missing or unparsable.
pub fn parse_started_at(raw: Option<&Value>) -> Option<OffsetDateTime> {
    raw.and_then(Value::as_str)
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
}

/// Errors raised while building a [`ShowtimeOfDay`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShowtimeError {
    /// Hour or minute out of range.
    #[error("invalid showtime {hour:02}:{minute:02}")]
    InvalidTime { hour: u8, minute: u8 },
    /// Offset beyond what a time zone can be.
    #[error("invalid UTC offset of {minutes} minutes")]
    InvalidOffset { minutes: i16 },
}

/// Fixed daily showtime, expressed in a given UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowtimeOfDay {
    time: Time,
    offset: UtcOffset,
}

impl ShowtimeOfDay {
    /// Build a daily showtime at `hour:minute` in the zone `utc_offset_minutes` away from UTC.
    pub fn new(hour: u8, minute: u8, utc_offset_minutes: i16) -> Result<Self, ShowtimeError> {
        let time =
            Time::from_hms(hour, minute, 0).map_err(|_| ShowtimeError::InvalidTime { hour, minute })?;
        let offset = UtcOffset::from_whole_seconds(i32::from(utc_offset_minutes) * 60).map_err(
            |_| ShowtimeError::InvalidOffset {
                minutes: utc_offset_minutes,
            },
        )?;
        Ok(Self { time, offset })
    }

    /// Tonight's showtime, or tomorrow's once tonight's has passed.
    pub fn next_after(&self, now: OffsetDateTime) -> OffsetDateTime {
        let local = now.to_offset(self.offset);
        let tonight = local.replace_time(self.time);
        if local > tonight {
            tonight + time::Duration::DAY
        } else {
            tonight
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn payload_with_envelope_is_unwrapped() {
        let payload = json!({
            "eventType": "UPDATE",
            "new": { "is_live": true, "started_at": "2026-10-17T20:00:05Z" }
        });
        let state = RoomPlaybackState::from_payload(&payload);
        assert!(state.is_live);
        assert_eq!(state.started_at, Some(datetime!(2026-10-17 20:00:05 UTC)));
    }

    #[test]
    fn malformed_started_at_reads_as_no_session() {
        let payload = json!({ "is_live": true, "started_at": "tonight-ish" });
        let state = RoomPlaybackState::from_payload(&payload);
        assert!(state.is_live);
        assert_eq!(state.started_at, None);
    }

    #[test]
    fn non_boolean_is_live_defaults_to_false() {
        let payload = json!({ "is_live": "yes", "started_at": null });
        assert_eq!(RoomPlaybackState::from_payload(&payload), RoomPlaybackState::idle());
        assert_eq!(
            RoomPlaybackState::from_payload(&json!([])),
            RoomPlaybackState::idle()
        );
    }

    #[test]
    fn showtime_rolls_over_after_it_passed() {
        let showtime = ShowtimeOfDay::new(20, 0, 0).unwrap();
        assert_eq!(
            showtime.next_after(datetime!(2026-10-17 19:59:30 UTC)),
            datetime!(2026-10-17 20:00:00 UTC)
        );
        assert_eq!(
            showtime.next_after(datetime!(2026-10-17 20:00:00 UTC)),
            datetime!(2026-10-17 20:00:00 UTC)
        );
        assert_eq!(
            showtime.next_after(datetime!(2026-10-17 20:00:01 UTC)),
            datetime!(2026-10-18 20:00:00 UTC)
        );
    }

    #[test]
    fn showtime_honours_offset() {
        let showtime = ShowtimeOfDay::new(20, 0, 120).unwrap();
        assert_eq!(
            showtime.next_after(datetime!(2026-10-17 12:00:00 UTC)),
            datetime!(2026-10-17 18:00:00 UTC)
        );
    }

    #[test]
    fn rejects_out_of_range_showtime() {
        assert_eq!(
            ShowtimeOfDay::new(24, 0, 0),
            Err(ShowtimeError::InvalidTime {
                hour: 24,
                minute: 0
            })
        );
        assert!(ShowtimeOfDay::new(20, 0, 60 * 30).is_err());
    }
}
