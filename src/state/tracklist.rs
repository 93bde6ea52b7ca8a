use thiserror::Error;

/// One entry of the album's tracklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Track title.
    pub title: String,
    /// Offset of the track within the album audio, in seconds.
    pub start_seconds: u32,
}

impl Track {
    /// Build a track entry starting `start_seconds` into the album.
    pub fn new(title: impl Into<String>, start_seconds: u32) -> Self {
        Self {
            title: title.into(),
            start_seconds,
        }
    }
}

/// Reasons a tracklist can be rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TracklistError {
    /// No tracks at all.
    #[error("tracklist is empty")]
    Empty,
    /// The first offset is not zero.
    #[error("first track must start at 0s, starts at {0}s")]
    FirstTrackOffset(u32),
    /// Offsets are not strictly increasing.
    #[error("track #{index} does not start after the previous one")]
    NotAscending { index: usize },
    /// A track starts at or after the end of the album.
    #[error("track #{index} starts at or after the album end ({album_duration}s)")]
    PastAlbumEnd { index: usize, album_duration: u32 },
}

/// Where a given elapsed value falls within the album.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPosition {
    /// Zero-based index of the current track.
    pub index: usize,
    /// Seconds into the current track.
    pub elapsed: f64,
    /// Length of the current track in seconds.
    pub duration: f64,
    /// Progress through the current track, clamped to `[0, 100]`.
    pub progress: f64,
}

/// Static, ordered track offsets covering `[0, album_duration)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracklist {
    tracks: Vec<Track>,
    album_duration: u32,
}

impl Tracklist {
    /// Validate and build a tracklist. Offsets must start at zero, strictly increase, and stay
    /// below the album duration.
    pub fn new(tracks: Vec<Track>, album_duration: u32) -> Result<Self, TracklistError> {
        let first = tracks.first().ok_or(TracklistError::Empty)?;
        if first.start_seconds != 0 {
            return Err(TracklistError::FirstTrackOffset(first.start_seconds));
        }

        for (index, pair) in tracks.windows(2).enumerate() {
            if pair[1].start_seconds <= pair[0].start_seconds {
                return Err(TracklistError::NotAscending { index: index + 1 });
            }
        }

        if let Some((index, _)) = tracks
            .iter()
            .enumerate()
            .find(|(_, track)| track.start_seconds >= album_duration)
        {
            return Err(TracklistError::PastAlbumEnd {
                index,
                album_duration,
            });
        }

        Ok(Self {
            tracks,
            album_duration,
        })
    }

    /// Album length in seconds.
    pub fn album_duration(&self) -> u32 {
        self.album_duration
    }

    /// Tracks in album order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Track at `index`, if any.
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Map an album-elapsed value onto the current track.
    ///
    /// The current track is the last one whose offset is `<= elapsed`; values before zero map
    /// to the first track.
    pub fn position(&self, elapsed: f64) -> TrackPosition {
        let index = self
            .tracks
            .partition_point(|track| f64::from(track.start_seconds) <= elapsed)
            .saturating_sub(1);

        let start = f64::from(self.tracks[index].start_seconds);
        let end = self
            .tracks
            .get(index + 1)
            .map(|next| next.start_seconds)
            .unwrap_or(self.album_duration);
        let duration = f64::from(end) - start;
        let local = (elapsed - start).max(0.0);
        let progress = (local / duration * 100.0).clamp(0.0, 100.0);

        TrackPosition {
            index,
            elapsed: local,
            duration,
            progress,
        }
    }
}

/// Render seconds as `m:ss`, the way track positions are displayed.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lonerism() -> Tracklist {
        Tracklist::new(
            vec![
                Track::new("Be Above It", 0),
                Track::new("Endors Toi", 202),
                Track::new("Apocalypse Dreams", 388),
                Track::new("Mind Mischief", 745),
                Track::new("Music to Walk Home By", 1017),
                Track::new("Why Won't They Talk to Me?", 1330),
                Track::new("Feels Like We Only Go Backwards", 1616),
                Track::new("Keep on Lying", 1809),
                Track::new("Elephant", 2163),
                Track::new("She Just Won't Believe Me", 2374),
                Track::new(
                    "Nothing That Has Happened So Far Has Been Anything We Could Control",
                    2431,
                ),
                Track::new("Sun's Coming Up", 2791),
            ],
            3112,
        )
        .unwrap()
    }

    #[test]
    fn boundaries_pick_the_track_that_starts_there() {
        let list = Tracklist::new(
            vec![
                Track::new("t0", 0),
                Track::new("t1", 202),
                Track::new("t2", 388),
            ],
            600,
        )
        .unwrap();

        assert_eq!(list.position(0.0).index, 0);
        assert_eq!(list.position(201.0).index, 0);
        assert_eq!(list.position(201.999).index, 0);
        assert_eq!(list.position(202.0).index, 1);
        assert_eq!(list.position(387.5).index, 1);
        assert_eq!(list.position(388.0).index, 2);
    }

    #[test]
    fn elapsed_400_lands_in_third_track() {
        let position = lonerism().position(400.0);
        assert_eq!(position.index, 2);
        assert_eq!(position.elapsed, 12.0);
        assert_eq!(position.duration, 357.0);
    }

    #[test]
    fn last_track_runs_until_album_end() {
        let list = lonerism();
        let position = list.position(3000.0);
        assert_eq!(position.index, 11);
        assert_eq!(position.duration, 321.0);
        assert_eq!(list.track(position.index).unwrap().title, "Sun's Coming Up");
    }

    #[test]
    fn progress_is_clamped() {
        let list = lonerism();
        assert_eq!(list.position(-5.0).progress, 0.0);
        assert_eq!(list.position(-5.0).elapsed, 0.0);
        assert_eq!(list.position(5000.0).progress, 100.0);
        assert_eq!(list.position(101.0).progress, 50.0);
    }

    #[test]
    fn rejects_malformed_lists() {
        assert_eq!(Tracklist::new(vec![], 10), Err(TracklistError::Empty));
        assert_eq!(
            Tracklist::new(vec![Track::new("a", 3)], 10),
            Err(TracklistError::FirstTrackOffset(3))
        );
        assert_eq!(
            Tracklist::new(vec![Track::new("a", 0), Track::new("b", 0)], 10),
            Err(TracklistError::NotAscending { index: 1 })
        );
        assert_eq!(
            Tracklist::new(vec![Track::new("a", 0), Track::new("b", 10)], 10),
            Err(TracklistError::PastAlbumEnd {
                index: 1,
                album_duration: 10
            })
        );
    }

    #[test]
    fn clock_format_pads_seconds() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(198.7), "3:18");
        assert_eq!(format_clock(3112.0), "51:52");
        assert_eq!(format_clock(-3.0), "0:00");
    }
}
