use serde::Serialize;
use utoipa::ToSchema;

use crate::config::AppConfig;

/// One entry of the album tracklist.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackSummary {
    pub index: usize,
    pub title: String,
    pub start_seconds: u32,
    pub duration_seconds: u32,
}

/// Featured album with its audio asset and tracklist.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlbumResponse {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: u16,
    pub audio_url: String,
    pub duration_seconds: u32,
    /// Length of the pre-show ceremony.
    pub pre_show_seconds: u64,
    /// Room clients join unless a link names another one.
    pub default_room_id: String,
    pub tracks: Vec<TrackSummary>,
}

impl From<&AppConfig> for AlbumResponse {
    fn from(config: &AppConfig) -> Self {
        let album = config.album();
        let tracklist = config.tracklist();
        let tracks = tracklist.tracks();
        let tracks = tracks
            .iter()
            .enumerate()
            .map(|(index, track)| {
                let end = tracks
                    .get(index + 1)
                    .map(|next| next.start_seconds)
                    .unwrap_or(tracklist.album_duration());
                TrackSummary {
                    index,
                    title: track.title.clone(),
                    start_seconds: track.start_seconds,
                    duration_seconds: end - track.start_seconds,
                }
            })
            .collect();

        Self {
            id: album.id.clone(),
            title: album.title.clone(),
            artist: album.artist.clone(),
            year: album.year,
            audio_url: album.audio_url.clone(),
            duration_seconds: tracklist.album_duration(),
            pre_show_seconds: config.phase_config().pre_show.as_secs(),
            default_room_id: config.default_room().to_string(),
            tracks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_durations_cover_the_album() {
        let album = AlbumResponse::from(&AppConfig::default());
        let total: u32 = album.tracks.iter().map(|t| t.duration_seconds).sum();
        assert_eq!(total, album.duration_seconds);
        assert_eq!(album.tracks[1].duration_seconds, 186);
        assert_eq!(album.tracks[11].duration_seconds, 321);
    }
}
