//! Client-side playback runtime: applies room snapshots, drives the audio transport and keeps
//! the display values ticking.
//!
//! The audio element is seeded once per `started_at` (or once per unlock) and then left to
//! run on its own clock. Re-seeding on every tick would be audible, so ticks only refresh the
//! displayed elapsed value and the phase.

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::state::{
    clock::Clock,
    phase::{DerivedPhase, EntryPoint, LocalPhase, PhaseConfig, Role, derive, entry_point},
    room::RoomPlaybackState,
    tracklist::{TrackPosition, Tracklist},
};

/// Raised by an [`AudioTransport`] when the platform refuses to start playback without a user
/// gesture.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("playback blocked until the user interacts with the page")]
pub struct PlaybackBlocked;

/// The single streamable audio element a client owns.
pub trait AudioTransport {
    /// Move the playback position to `seconds` into the album.
    fn seek(&mut self, seconds: f64);
    /// Start or continue playback.
    fn play(&mut self) -> Result<(), PlaybackBlocked>;
    /// Pause without moving the position.
    fn pause(&mut self);
}

/// Admin-only operations that cannot apply in the current state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Listeners cannot pause.
    #[error("only the admin can pause or resume playback")]
    AdminOnly,
    /// Pausing outside the live phase.
    #[error("playback can only be paused while live (currently {0:?})")]
    NotLive(LocalPhase),
    /// A pause is already held.
    #[error("playback is already paused")]
    AlreadyPaused,
    /// Resume without a pause.
    #[error("playback is not paused")]
    NotPaused,
}

/// Observed phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    /// Phase before the change.
    pub from: LocalPhase,
    /// Phase after the change.
    pub to: LocalPhase,
}

/// What the UI layer renders for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackView {
    /// Current phase.
    pub phase: LocalPhase,
    /// Screen to show.
    pub entry: EntryPoint,
    /// Display elapsed value, frozen while paused.
    pub elapsed: f64,
    /// Seconds left before the countdown target, rounded up.
    pub countdown_seconds: Option<u64>,
    /// Current track while live or finished.
    pub track: Option<TrackPosition>,
    /// Whether the local audio has been unlocked by a user gesture.
    pub audio_unlocked: bool,
    /// Whether this client paused its audio locally.
    pub paused: bool,
}

/// Playback runtime of one client.
pub struct ListeningSession<A, C> {
    config: PhaseConfig,
    tracklist: Tracklist,
    role: Role,
    clock: C,
    transport: A,
    room: RoomPlaybackState,
    derived: DerivedPhase,
    audio_unlocked: bool,
    seeded_for: Option<OffsetDateTime>,
    paused_at: Option<f64>,
}

impl<A, C> ListeningSession<A, C>
where
    A: AudioTransport,
    C: Clock,
{
    /// Create a session that has not seen any snapshot yet: it renders the default phase
    /// until the first fetch resolves.
    pub fn new(config: PhaseConfig, tracklist: Tracklist, role: Role, clock: C, transport: A) -> Self {
        let room = RoomPlaybackState::idle();
        let derived = derive(&room, clock.now(), &config);
        Self {
            config,
            tracklist,
            role,
            clock,
            transport,
            room,
            derived,
            audio_unlocked: false,
            seeded_for: None,
            paused_at: None,
        }
    }

    /// Apply a snapshot from the initial fetch or the change feed.
    ///
    /// Re-applying an identical snapshot is a no-op apart from refreshing the phase; a new
    /// `started_at` re-seeds the audio, and a reset stops it.
    pub fn apply_snapshot(&mut self, snapshot: RoomPlaybackState) -> Option<PhaseChange> {
        if snapshot.started_at != self.room.started_at {
            debug!(started_at = ?snapshot.started_at, "room start instant changed");
            self.seeded_for = None;
            self.paused_at = None;
            if snapshot.started_at.is_none() {
                self.stop_audio();
            }
        }
        self.room = snapshot;
        self.refresh()
    }

    /// Record the first user gesture. Playback that was deferred starts now.
    pub fn unlock_audio(&mut self) -> Option<PhaseChange> {
        if !self.audio_unlocked {
            info!("audio unlocked");
            self.audio_unlocked = true;
        }
        self.refresh()
    }

    /// Periodic (about once a second) recomputation of phase and display values.
    pub fn tick(&mut self) -> Option<PhaseChange> {
        self.refresh()
    }

    /// Pause the local audio and remember where it stopped. The shared record is untouched.
    pub fn pause(&mut self) -> Result<f64, SessionError> {
        if self.role != Role::Admin {
            return Err(SessionError::AdminOnly);
        }
        if self.paused_at.is_some() {
            return Err(SessionError::AlreadyPaused);
        }

        self.refresh();
        if self.derived.phase != LocalPhase::Live {
            return Err(SessionError::NotLive(self.derived.phase));
        }

        let elapsed = self.derived.elapsed;
        self.transport.pause();
        self.paused_at = Some(elapsed);
        info!(elapsed, "playback paused locally");
        Ok(elapsed)
    }

    /// Compute the record that resumes playback where it was paused.
    ///
    /// The caller writes it to the shared store; every client, this one included, re-seeds
    /// when the new `started_at` comes back through the feed.
    pub fn resume(&mut self) -> Result<RoomPlaybackState, SessionError> {
        if self.role != Role::Admin {
            return Err(SessionError::AdminOnly);
        }
        let paused = self.paused_at.ok_or(SessionError::NotPaused)?;
        let started_at = self.clock.now() - time::Duration::seconds_f64(paused);
        Ok(RoomPlaybackState::live_at(started_at))
    }

    /// Current render state.
    pub fn view(&self) -> PlaybackView {
        let phase = self.derived.phase;
        let elapsed = self.paused_at.unwrap_or(self.derived.elapsed);
        let track = matches!(phase, LocalPhase::Live | LocalPhase::Finished)
            .then(|| self.tracklist.position(elapsed));

        PlaybackView {
            phase,
            entry: entry_point(self.role, phase),
            elapsed,
            countdown_seconds: self.derived.countdown_seconds(),
            track,
            audio_unlocked: self.audio_unlocked,
            paused: self.paused_at.is_some(),
        }
    }

    /// Last applied room snapshot.
    pub fn room(&self) -> &RoomPlaybackState {
        &self.room
    }

    /// Borrow the audio transport.
    pub fn transport(&self) -> &A {
        &self.transport
    }

    fn refresh(&mut self) -> Option<PhaseChange> {
        let previous = self.derived.phase;
        self.derived = derive(&self.room, self.clock.now(), &self.config);
        let current = self.derived.phase;

        if current == LocalPhase::Finished && previous != LocalPhase::Finished {
            info!("album finished; stopping audio");
            self.stop_audio();
        }

        self.seed_if_needed();

        (previous != current).then_some(PhaseChange {
            from: previous,
            to: current,
        })
    }

    fn seed_if_needed(&mut self) {
        if self.derived.phase != LocalPhase::Live || !self.audio_unlocked || self.paused_at.is_some()
        {
            return;
        }
        let Some(started_at) = self.room.started_at else {
            return;
        };
        if self.seeded_for == Some(started_at) {
            return;
        }

        let elapsed = self.derived.elapsed;
        self.transport.seek(elapsed);
        match self.transport.play() {
            Ok(()) => {
                info!(elapsed, "audio seeded");
                self.seeded_for = Some(started_at);
            }
            Err(err) => {
                // Deferred until the next gesture unlocks audio again.
                debug!(error = %err, "autoplay rejected");
                self.audio_unlocked = false;
            }
        }
    }

    fn stop_audio(&mut self) {
        self.transport.pause();
        self.transport.seek(0.0);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::state::{clock::ManualClock, tracklist::Track};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Seek(f64),
        Play,
        Pause,
    }

    #[derive(Default)]
    struct RecordingTransport {
        calls: Vec<Call>,
        blocked: bool,
    }

    impl RecordingTransport {
        fn seeks(&self) -> Vec<f64> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Seek(at) => Some(*at),
                    _ => None,
                })
                .collect()
        }
    }

    impl AudioTransport for RecordingTransport {
        fn seek(&mut self, seconds: f64) {
            self.calls.push(Call::Seek(seconds));
        }

        fn play(&mut self) -> Result<(), PlaybackBlocked> {
            if self.blocked {
                return Err(PlaybackBlocked);
            }
            self.calls.push(Call::Play);
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.push(Call::Pause);
        }
    }

    const START: OffsetDateTime = datetime!(2026-10-17 20:00:00 UTC);

    fn session(role: Role, clock: &ManualClock) -> ListeningSession<RecordingTransport, ManualClock> {
        let tracklist = Tracklist::new(
            vec![
                Track::new("Be Above It", 0),
                Track::new("Endors Toi", 202),
                Track::new("Apocalypse Dreams", 388),
            ],
            600,
        )
        .unwrap();
        let config = PhaseConfig {
            showtime: None,
            pre_show: Duration::from_secs(30),
            album_duration: Duration::from_secs(600),
        };
        ListeningSession::new(config, tracklist, role, clock.clone(), RecordingTransport::default())
    }

    #[test]
    fn seeding_waits_for_unlock() {
        let clock = ManualClock::new(START + time::Duration::seconds(42));
        let mut session = session(Role::Listener, &clock);

        let change = session.apply_snapshot(RoomPlaybackState::live_at(START));
        assert_eq!(
            change,
            Some(PhaseChange {
                from: LocalPhase::Waiting,
                to: LocalPhase::Live
            })
        );
        assert!(session.transport().calls.is_empty());

        session.unlock_audio();
        assert_eq!(session.transport().calls, vec![Call::Seek(42.0), Call::Play]);
    }

    #[test]
    fn duplicate_snapshots_do_not_reseed() {
        let clock = ManualClock::new(START + time::Duration::seconds(10));
        let mut session = session(Role::Listener, &clock);
        session.unlock_audio();

        session.apply_snapshot(RoomPlaybackState::live_at(START));
        let first = session.view();
        let change = session.apply_snapshot(RoomPlaybackState::live_at(START));

        assert_eq!(change, None);
        assert_eq!(session.view(), first);
        assert_eq!(session.transport().seeks(), vec![10.0]);
    }

    #[test]
    fn ticks_update_display_without_touching_audio() {
        let clock = ManualClock::new(START);
        let mut session = session(Role::Listener, &clock);
        session.unlock_audio();
        session.apply_snapshot(RoomPlaybackState::live_at(START));

        for _ in 0..5 {
            clock.advance(time::Duration::SECOND);
            session.tick();
        }

        assert_eq!(session.view().elapsed, 5.0);
        assert_eq!(session.transport().seeks(), vec![0.0]);
    }

    #[test]
    fn ceremony_then_live_seeds_at_start() {
        let clock = ManualClock::new(START - time::Duration::seconds(5));
        let mut session = session(Role::Listener, &clock);
        session.unlock_audio();

        session.apply_snapshot(RoomPlaybackState::live_at(START));
        assert_eq!(session.view().phase, LocalPhase::Entering);
        assert_eq!(session.view().countdown_seconds, Some(5));
        assert!(session.transport().calls.is_empty());

        clock.advance(time::Duration::seconds(5));
        let change = session.tick();
        assert_eq!(
            change,
            Some(PhaseChange {
                from: LocalPhase::Entering,
                to: LocalPhase::Live
            })
        );
        assert_eq!(session.transport().seeks(), vec![0.0]);
    }

    #[test]
    fn late_join_after_album_end_never_plays() {
        let clock = ManualClock::new(START + time::Duration::seconds(900));
        let mut session = session(Role::Listener, &clock);
        session.unlock_audio();
        session.apply_snapshot(RoomPlaybackState::live_at(START));

        let view = session.view();
        assert_eq!(view.phase, LocalPhase::Finished);
        assert_eq!(view.elapsed, 600.0);
        assert!(!session.transport().calls.contains(&Call::Play));
    }

    #[test]
    fn reaching_album_end_stops_audio() {
        let clock = ManualClock::new(START + time::Duration::seconds(599));
        let mut session = session(Role::Listener, &clock);
        session.unlock_audio();
        session.apply_snapshot(RoomPlaybackState::live_at(START));

        clock.advance(time::Duration::seconds(2));
        let change = session.tick();

        assert_eq!(change.map(|c| c.to), Some(LocalPhase::Finished));
        assert_eq!(
            session.transport().calls,
            vec![Call::Seek(599.0), Call::Play, Call::Pause, Call::Seek(0.0)]
        );
    }

    #[test]
    fn reset_returns_to_waiting_from_any_phase() {
        let clock = ManualClock::new(START + time::Duration::seconds(900));
        let mut session = session(Role::Listener, &clock);
        session.apply_snapshot(RoomPlaybackState::live_at(START));
        assert_eq!(session.view().phase, LocalPhase::Finished);

        let change = session.apply_snapshot(RoomPlaybackState::idle());
        assert_eq!(change.map(|c| c.to), Some(LocalPhase::Waiting));
        assert_eq!(session.view().entry, EntryPoint::Lobby);
    }

    #[test]
    fn blocked_autoplay_is_retried_on_next_unlock() {
        let clock = ManualClock::new(START + time::Duration::seconds(30));
        let mut session = session(Role::Listener, &clock);
        session.transport.blocked = true;
        session.unlock_audio();
        session.apply_snapshot(RoomPlaybackState::live_at(START));

        assert_eq!(session.view().phase, LocalPhase::Live);
        assert!(!session.view().audio_unlocked);

        session.transport.blocked = false;
        clock.advance(time::Duration::seconds(3));
        session.unlock_audio();
        assert_eq!(session.transport().seeks(), vec![30.0, 33.0]);
        assert_eq!(session.transport().calls.last(), Some(&Call::Play));
    }

    #[test]
    fn pause_then_resume_continues_from_paused_position() {
        let clock = ManualClock::new(START + time::Duration::seconds(120));
        let mut session = session(Role::Admin, &clock);
        session.unlock_audio();
        session.apply_snapshot(RoomPlaybackState::live_at(START));

        let paused = session.pause().unwrap();
        assert_eq!(paused, 120.0);

        clock.advance(time::Duration::seconds(45));
        session.tick();
        assert_eq!(session.view().elapsed, 120.0);
        assert!(session.view().paused);

        let resumed = session.resume().unwrap();
        let now = clock.now();
        let offset = crate::state::phase::elapsed_since(resumed.started_at.unwrap(), now);
        assert!((offset - 120.0).abs() < 1e-6);

        session.apply_snapshot(resumed);
        assert!(!session.view().paused);
        assert_eq!(session.transport().seeks(), vec![120.0, 120.0]);
    }

    #[test]
    fn listeners_cannot_pause() {
        let clock = ManualClock::new(START + time::Duration::seconds(1));
        let mut session = session(Role::Listener, &clock);
        session.apply_snapshot(RoomPlaybackState::live_at(START));
        assert_eq!(session.pause(), Err(SessionError::AdminOnly));
        assert_eq!(session.resume(), Err(SessionError::AdminOnly));
    }

    #[test]
    fn pause_requires_live_playback() {
        let clock = ManualClock::new(START - time::Duration::seconds(10));
        let mut session = session(Role::Admin, &clock);
        session.apply_snapshot(RoomPlaybackState::live_at(START));
        assert_eq!(session.pause(), Err(SessionError::NotLive(LocalPhase::Entering)));
        assert_eq!(session.resume(), Err(SessionError::NotPaused));
    }

    #[test]
    fn live_view_reports_current_track() {
        let clock = ManualClock::new(START + time::Duration::seconds(400));
        let mut session = session(Role::Listener, &clock);
        session.apply_snapshot(RoomPlaybackState::live_at(START));

        let track = session.view().track.unwrap();
        assert_eq!(track.index, 2);
        assert_eq!(track.elapsed, 12.0);
    }
}
