//! Lobby vote tally. One vote per user and room; a new vote replaces the previous one.

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    config::CatalogueAlbum,
    dao::models::VoteEntity,
    dto::votes::{AlbumTally, CastVoteRequest, VoteTally},
    error::ServiceError,
    services::{room_service, sse_events},
    state::SharedState,
};

/// Record `request.user_id`'s vote and push the updated tally.
pub async fn cast_vote(
    state: &SharedState,
    room_id: &str,
    request: CastVoteRequest,
) -> Result<VoteTally, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    if !state.config().is_known_album(&request.album_id) {
        return Err(ServiceError::InvalidInput(format!(
            "unknown album `{}`",
            request.album_id
        )));
    }

    let user_id = request.user_id;
    let vote = VoteEntity {
        room_id: room_id.to_string(),
        user_id: user_id.clone(),
        album_id: request.album_id,
        updated_at: state.now(),
    };

    // Write, tally and push under the gate so tallies reach the feed in write order.
    state
        .run_write(|| async {
            let store = state.require_room_store().await?;
            store.save_vote(vote).await?;
            debug!(room_id, user_id = %user_id, "vote recorded");

            let tally = current_tally(state, room_id, Some(&user_id)).await?;
            sse_events::broadcast_vote_tally(state, &tally);
            Ok(tally)
        })
        .await
}

/// Withdraw `user_id`'s vote and push the updated tally.
pub async fn retract_vote(
    state: &SharedState,
    room_id: &str,
    user_id: &str,
) -> Result<VoteTally, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    state
        .run_write(|| async {
            let store = state.require_room_store().await?;
            if !store
                .delete_vote(room_id.to_string(), user_id.to_string())
                .await?
            {
                return Err(ServiceError::NotFound(format!(
                    "no vote from `{user_id}` in room `{room_id}`"
                )));
            }

            let tally = current_tally(state, room_id, Some(user_id)).await?;
            sse_events::broadcast_vote_tally(state, &tally);
            Ok(tally)
        })
        .await
}

/// Tally read from storage in one go, so it always reflects the latest write.
pub async fn current_tally(
    state: &SharedState,
    room_id: &str,
    user_id: Option<&str>,
) -> Result<VoteTally, ServiceError> {
    room_service::ensure_room_id(room_id)?;
    let store = state.require_room_store().await?;
    let votes = store.list_votes(room_id.to_string()).await?;
    Ok(tally(room_id, state.config().catalogue(), &votes, user_id))
}

/// Count `votes` per catalogue album. Votes for albums no longer listed are ignored.
pub fn tally(
    room_id: &str,
    catalogue: &[CatalogueAlbum],
    votes: &[VoteEntity],
    user_id: Option<&str>,
) -> VoteTally {
    let mut counts: IndexMap<&str, usize> = catalogue
        .iter()
        .map(|album| (album.id.as_str(), 0))
        .collect();
    for vote in votes {
        if let Some(count) = counts.get_mut(vote.album_id.as_str()) {
            *count += 1;
        }
    }

    let total = counts.values().sum();
    let mut leader: Option<(&str, usize)> = None;
    for (&album_id, &count) in &counts {
        if count > 0 && leader.is_none_or(|(_, best)| count > best) {
            leader = Some((album_id, count));
        }
    }

    let your_vote = user_id.and_then(|user| {
        votes
            .iter()
            .find(|vote| vote.user_id == user && counts.contains_key(vote.album_id.as_str()))
            .map(|vote| vote.album_id.clone())
    });

    VoteTally {
        room_id: room_id.to_string(),
        albums: catalogue
            .iter()
            .map(|album| AlbumTally {
                album_id: album.id.clone(),
                title: album.title.clone(),
                artist: album.artist.clone(),
                year: album.year,
                votes: counts.get(album.id.as_str()).copied().unwrap_or_default(),
            })
            .collect(),
        total,
        leader: leader.map(|(album_id, _)| album_id.to_string()),
        your_vote,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use time::macros::datetime;

    use super::*;
    use crate::{
        config::AppConfig, dao::room_store::memory::MemoryRoomStore, state::AppState,
    };

    fn vote(user: &str, album: &str) -> VoteEntity {
        VoteEntity {
            room_id: "main".into(),
            user_id: user.into(),
            album_id: album.into(),
            updated_at: datetime!(2026-10-17 18:00 UTC),
        }
    }

    fn cast(user: &str, album: &str) -> CastVoteRequest {
        CastVoteRequest {
            user_id: user.into(),
            album_id: album.into(),
        }
    }

    #[test]
    fn counts_follow_catalogue_order_and_ties_go_to_the_earlier_album() {
        let config = AppConfig::default();
        let votes = [
            vote("a", "abbey-road"),
            vote("b", "lonerism"),
            vote("c", "retired-album"),
        ];

        let tally = tally("main", config.catalogue(), &votes, Some("b"));
        let ids: Vec<_> = tally.albums.iter().map(|a| a.album_id.as_str()).collect();
        assert_eq!(ids, ["mysticism-romance", "lonerism", "abbey-road"]);
        let counts: Vec<_> = tally.albums.iter().map(|a| a.votes).collect();
        assert_eq!(counts, [0, 1, 1]);
        assert_eq!(tally.total, 2);
        assert_eq!(tally.leader.as_deref(), Some("lonerism"));
        assert_eq!(tally.your_vote.as_deref(), Some("lonerism"));
    }

    #[test]
    fn empty_rooms_have_no_leader() {
        let config = AppConfig::default();
        let tally = tally("main", config.catalogue(), &[], None);
        assert_eq!(tally.total, 0);
        assert_eq!(tally.leader, None);
        assert_eq!(tally.albums.len(), 3);
    }

    #[tokio::test]
    async fn revoting_replaces_the_previous_vote() {
        let state = AppState::new(AppConfig::default());
        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;

        cast_vote(&state, "main", cast("u1", "lonerism")).await.unwrap();
        cast_vote(&state, "main", cast("u2", "lonerism")).await.unwrap();
        let tally = cast_vote(&state, "main", cast("u1", "abbey-road"))
            .await
            .unwrap();

        assert_eq!(tally.total, 2);
        assert_eq!(tally.your_vote.as_deref(), Some("abbey-road"));
        assert_eq!(tally.leader.as_deref(), Some("lonerism"));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_casts_push_tallies_in_write_order() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryRoomStore::new();
        state.set_room_store(Arc::new(store.clone())).await;
        let mut feed = state.subscribe_room("main");

        store.delay_next_vote_listing(Duration::from_secs(1));
        let slow = tokio::spawn({
            let state = state.clone();
            async move { cast_vote(&state, "main", cast("u1", "lonerism")).await }
        });
        tokio::task::yield_now().await;
        let fast = cast_vote(&state, "main", cast("u2", "abbey-road"))
            .await
            .unwrap();
        slow.await.unwrap().unwrap();
        assert_eq!(fast.total, 2);

        let mut last = None;
        while let Ok(event) = feed.try_recv() {
            if event.event.as_deref() == Some(sse_events::EVENT_VOTES_TALLY) {
                last = Some(event.data);
            }
        }
        let last: serde_json::Value = serde_json::from_str(&last.unwrap()).unwrap();
        assert_eq!(last["total"], 2);
    }

    #[tokio::test]
    async fn unknown_albums_and_missing_votes_are_rejected() {
        let state = AppState::new(AppConfig::default());
        state.set_room_store(Arc::new(MemoryRoomStore::new())).await;

        assert!(matches!(
            cast_vote(&state, "main", cast("u1", "ok-computer")).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            retract_vote(&state, "main", "u1").await,
            Err(ServiceError::NotFound(_))
        ));

        cast_vote(&state, "main", cast("u1", "lonerism")).await.unwrap();
        let tally = retract_vote(&state, "main", "u1").await.unwrap();
        assert_eq!(tally.total, 0);
        assert_eq!(tally.your_vote, None);
    }
}
