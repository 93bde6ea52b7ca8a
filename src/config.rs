//! Application-level configuration loading: showtime, ceremony timings, the featured album and
//! the lobby catalogue.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::{
    phase::PhaseConfig,
    room::{DEFAULT_ROOM_ID, ShowtimeError, ShowtimeOfDay},
    tracklist::{Track, Tracklist, TracklistError},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ALBUM_CLUB_CONFIG_PATH";

const DEFAULT_PRE_SHOW: Duration = Duration::from_secs(30);
const DEFAULT_START_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_CHAT_HISTORY_LIMIT: usize = 100;

/// Album played in the listening room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedAlbum {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: u16,
    /// Single streamable, seekable asset shared by every client.
    pub audio_url: String,
}

/// Album listed in the lobby vote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogueAlbum {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: u16,
}

/// Reasons a configuration file is rejected as a whole.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is not valid JSON for the expected shape.
    #[error("malformed JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// Showtime hour, minute or offset out of range.
    #[error(transparent)]
    Showtime(#[from] ShowtimeError),
    /// Track offsets do not cover the album.
    #[error("invalid tracklist: {0}")]
    Tracklist(#[from] TracklistError),
    /// Chat history limit of zero.
    #[error("chat history limit must be at least 1")]
    EmptyChatHistory,
    /// Two catalogue entries share an id.
    #[error("album catalogue lists `{0}` twice")]
    DuplicateAlbum(String),
    /// Blank default room id.
    #[error("default room id must not be empty")]
    EmptyRoomId,
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    showtime: Option<ShowtimeOfDay>,
    pre_show: Duration,
    start_delay: Duration,
    chat_history_limit: usize,
    default_room: String,
    album: FeaturedAlbum,
    tracklist: Tracklist,
    catalogue: Vec<CatalogueAlbum>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        album = %config.album.title,
                        tracks = config.tracklist.tracks().len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document. Missing keys take their default value.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        Self::try_from(raw)
    }

    /// Inputs of the phase derivation.
    pub fn phase_config(&self) -> PhaseConfig {
        PhaseConfig {
            showtime: self.showtime,
            pre_show: self.pre_show,
            album_duration: Duration::from_secs(u64::from(self.tracklist.album_duration())),
        }
    }

    /// Grace added to "now" by a start-now write.
    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn chat_history_limit(&self) -> usize {
        self.chat_history_limit
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    pub fn album(&self) -> &FeaturedAlbum {
        &self.album
    }

    pub fn tracklist(&self) -> &Tracklist {
        &self.tracklist
    }

    /// Albums open for voting, in display order.
    pub fn catalogue(&self) -> &[CatalogueAlbum] {
        &self.catalogue
    }

    pub fn is_known_album(&self, album_id: &str) -> bool {
        self.catalogue.iter().any(|album| album.id == album_id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            showtime: ShowtimeOfDay::new(20, 0, 0).ok(),
            pre_show: DEFAULT_PRE_SHOW,
            start_delay: DEFAULT_START_DELAY,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
            default_room: DEFAULT_ROOM_ID.to_string(),
            album: default_album(),
            tracklist: default_tracklist(),
            catalogue: default_catalogue(),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    showtime: Option<RawShowtime>,
    #[serde(rename = "pre_show_seconds")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pre_show: Duration,
    #[serde(rename = "start_delay_seconds")]
    #[serde_as(as = "DurationSeconds<u64>")]
    start_delay: Duration,
    chat_history_limit: usize,
    default_room: String,
    album: Option<RawAlbum>,
    catalogue: Option<Vec<CatalogueAlbum>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            showtime: Some(RawShowtime {
                hour: 20,
                minute: 0,
                utc_offset_minutes: 0,
            }),
            pre_show: DEFAULT_PRE_SHOW,
            start_delay: DEFAULT_START_DELAY,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
            default_room: DEFAULT_ROOM_ID.to_string(),
            album: None,
            catalogue: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawShowtime {
    hour: u8,
    minute: u8,
    #[serde(default)]
    utc_offset_minutes: i16,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    id: String,
    title: String,
    artist: String,
    year: u16,
    audio_url: String,
    duration_seconds: u32,
    tracks: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    title: String,
    start_seconds: u32,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let showtime = value
            .showtime
            .map(|raw| ShowtimeOfDay::new(raw.hour, raw.minute, raw.utc_offset_minutes))
            .transpose()?;

        let (album, tracklist) = match value.album {
            Some(raw) => {
                let tracks = raw
                    .tracks
                    .into_iter()
                    .map(|track| Track::new(track.title, track.start_seconds))
                    .collect();
                let tracklist = Tracklist::new(tracks, raw.duration_seconds)?;
                let album = FeaturedAlbum {
                    id: raw.id,
                    title: raw.title,
                    artist: raw.artist,
                    year: raw.year,
                    audio_url: raw.audio_url,
                };
                (album, tracklist)
            }
            None => (default_album(), default_tracklist()),
        };

        let catalogue = value.catalogue.unwrap_or_else(default_catalogue);
        for (index, album) in catalogue.iter().enumerate() {
            if catalogue[..index].iter().any(|other| other.id == album.id) {
                return Err(ConfigError::DuplicateAlbum(album.id.clone()));
            }
        }

        if value.chat_history_limit == 0 {
            return Err(ConfigError::EmptyChatHistory);
        }
        if value.default_room.trim().is_empty() {
            return Err(ConfigError::EmptyRoomId);
        }

        Ok(Self {
            showtime,
            pre_show: value.pre_show,
            start_delay: value.start_delay,
            chat_history_limit: value.chat_history_limit,
            default_room: value.default_room,
            album,
            tracklist,
            catalogue,
        })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_album() -> FeaturedAlbum {
    FeaturedAlbum {
        id: "lonerism".into(),
        title: "Lonerism".into(),
        artist: "Tame Impala".into(),
        year: 2012,
        audio_url: "https://obnhrzehigtbadynicss.supabase.co/storage/v1/object/public/Albums/Lonerism.mp3"
            .into(),
    }
}

/// Built-in tracklist of the featured album.
fn default_tracklist() -> Tracklist {
    let tracks = [
        ("Be Above It", 0),
        ("Endors Toi", 202),
        ("Apocalypse Dreams", 388),
        ("Mind Mischief", 745),
        ("Music to Walk Home By", 1017),
        ("Why Won't They Talk to Me?", 1330),
        ("Feels Like We Only Go Backwards", 1616),
        ("Keep on Lying", 1809),
        ("Elephant", 2163),
        ("She Just Won't Believe Me", 2374),
        (
            "Nothing That Has Happened So Far Has Been Anything We Could Control",
            2431,
        ),
        ("Sun's Coming Up", 2791),
    ]
    .into_iter()
    .map(|(title, start)| Track::new(title, start))
    .collect();

    match Tracklist::new(tracks, 3112) {
        Ok(tracklist) => tracklist,
        Err(err) => unreachable!("built-in tracklist is invalid: {err}"),
    }
}

fn default_catalogue() -> Vec<CatalogueAlbum> {
    [
        ("mysticism-romance", "Mysticism & Romance", "Tony Newton", 1976),
        ("lonerism", "Lonerism", "Tame Impala", 2012),
        ("abbey-road", "Abbey Road", "The Beatles", 1969),
    ]
    .into_iter()
    .map(|(id, title, artist, year)| CatalogueAlbum {
        id: id.into(),
        title: title.into(),
        artist: artist.into(),
        year,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_featured_album() {
        let config = AppConfig::default();
        let phase = config.phase_config();
        assert_eq!(phase.album_duration, Duration::from_secs(3112));
        assert_eq!(phase.pre_show, Duration::from_secs(30));
        assert!(phase.showtime.is_some());
        assert_eq!(config.tracklist().tracks().len(), 12);
        assert_eq!(config.catalogue().len(), 3);
        assert_eq!(config.default_room(), "main");
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.start_delay(), Duration::from_secs(5));
        assert_eq!(config.chat_history_limit(), 100);
        assert_eq!(config.album().title, "Lonerism");
    }

    #[test]
    fn partial_document_overrides_durations_and_showtime() {
        let config = AppConfig::from_json(
            r#"{
                "showtime": null,
                "pre_show_seconds": 10,
                "start_delay_seconds": 2,
                "chat_history_limit": 20
            }"#,
        )
        .unwrap();
        let phase = config.phase_config();
        assert_eq!(phase.showtime, None);
        assert_eq!(phase.pre_show, Duration::from_secs(10));
        assert_eq!(config.start_delay(), Duration::from_secs(2));
        assert_eq!(config.chat_history_limit(), 20);
    }

    #[test]
    fn custom_album_is_validated() {
        let err = AppConfig::from_json(
            r#"{
                "album": {
                    "id": "x", "title": "X", "artist": "Y", "year": 2000,
                    "audio_url": "https://example.com/x.mp3",
                    "duration_seconds": 100,
                    "tracks": [{"title": "a", "start_seconds": 10}]
                }
            }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_duplicate_catalogue_entries() {
        let err = AppConfig::from_json(
            r#"{
                "catalogue": [
                    {"id": "a", "title": "A", "artist": "B", "year": 1990},
                    {"id": "a", "title": "A2", "artist": "B", "year": 1991}
                ]
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn known_albums_come_from_the_catalogue() {
        let config = AppConfig::default();
        assert!(config.is_known_album("abbey-road"));
        assert!(!config.is_known_album("thriller"));
    }

    #[test]
    fn shipped_config_matches_the_defaults() {
        let config = AppConfig::from_json(include_str!("../config/app.json")).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.album(), defaults.album());
        assert_eq!(config.tracklist(), defaults.tracklist());
        assert_eq!(config.catalogue(), defaults.catalogue());
        assert_eq!(config.phase_config(), defaults.phase_config());
    }
}
