//! Spectator session tracker: per-connection play-session state for
//! users who are not occupying a `RoomUser` slot -- they watch a room's
//! gameplay subgroup without joining it.
//!
//! Kept deliberately thin: this component owns no room state at all, only
//! the connection-scoped `(state, score, token)` triple, and a handle into
//! the upload pipeline to forward finished plays to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ids::{RoomId, ScoreToken, UserId};
use super::upload::{LocalScore, ScoreUploadPipeline};
use crate::multiplayer::ports::{ScoreDatabase, ScoreStorage};

/// Client-reported state accompanying a play session; opaque payload as
/// far as this component is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectatorState {
    pub beatmap_id: u64,
    pub ruleset_id: i32,
}

/// How a play session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayCompletion {
    Passed,
    Failed,
    Quit,
}

/// Events a caller should fan out to the room group after a session
/// transition.
#[derive(Debug, Clone)]
pub enum SpectatorEvent {
    UserBeganPlaying(UserId),
    UserFinishedPlaying(UserId, PlayCompletion),
}

#[derive(Debug, Clone)]
struct ClientSession {
    room_id: RoomId,
    state: Option<SpectatorState>,
    score: LocalScore,
    token: Option<ScoreToken>,
}

/// One entry per connection currently inside a play session. Keyed by
/// `UserId` rather than a connection id -- a user has at most one live
/// session at a time in this engine.
#[derive(Default)]
pub struct SpectatorSessionTracker {
    sessions: dashmap::DashMap<UserId, ClientSession>,
}

impl SpectatorSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins tracking a play session: stores the token and client state,
    /// returning the fan-out event the hub should publish to the room.
    pub fn begin_play_session(
        &self,
        user_id: UserId,
        room_id: RoomId,
        token: Option<ScoreToken>,
        state: SpectatorState,
        initial_score: LocalScore,
    ) -> SpectatorEvent {
        self.sessions.insert(
            user_id,
            ClientSession {
                room_id,
                state: Some(state),
                score: initial_score,
                token,
            },
        );
        SpectatorEvent::UserBeganPlaying(user_id)
    }

    /// Appends a streamed replay frame to the in-memory score, a no-op if
    /// the user has no active session.
    pub fn send_frame_data(&self, user_id: UserId, frame: &[u8]) {
        if let Some(mut session) = self.sessions.get_mut(&user_id) {
            session.score.replay.extend_from_slice(frame);
        }
    }

    /// Ends a play session. If a score token was captured, hands
    /// `(token, score)` to the upload pipeline. Returns `None` if the user
    /// had no active session (e.g. a duplicate `EndPlaySession`).
    pub fn end_play_session(
        &self,
        user_id: UserId,
        completion: PlayCompletion,
        pipeline: &ScoreUploadPipeline,
    ) -> Option<SpectatorEvent> {
        let (_, session) = self.sessions.remove(&user_id)?;
        if let Some(token) = session.token {
            pipeline.enqueue(token.get(), session.score);
        }
        Some(SpectatorEvent::UserFinishedPlaying(user_id, completion))
    }

    /// A dropped connection is equivalent to `EndPlaySession(Quit)`.
    pub fn handle_disconnect(
        &self,
        user_id: UserId,
        pipeline: &ScoreUploadPipeline,
    ) -> Option<SpectatorEvent> {
        self.end_play_session(user_id, PlayCompletion::Quit, pipeline)
    }

    pub fn is_playing(&self, user_id: UserId) -> bool {
        self.sessions.contains_key(&user_id)
    }

    pub fn room_of(&self, user_id: UserId) -> Option<RoomId> {
        self.sessions.get(&user_id).map(|s| s.room_id)
    }
}

/// Convenience constructor for a pipeline backed by a concrete DB/storage
/// pair, used by the hub when wiring a room's spectator tracker to its
/// shared upload pipeline.
pub fn upload_pipeline<D, S>(
    db: Arc<D>,
    storage: Arc<S>,
    settings: super::upload::UploadPipelineSettings,
    enabled: bool,
) -> Arc<ScoreUploadPipeline>
where
    D: ScoreDatabase + 'static,
    S: ScoreStorage + 'static,
{
    ScoreUploadPipeline::new(db, storage, settings, enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplayer::ids::PlaylistItemId;
    use crate::multiplayer::ports::{BeatmapSetUpdates, PlaylistItemRecord, RoomRecord, ScoreIdentity};
    use crate::multiplayer::upload::ApiUser;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct FakeDb {
        identity: RwLock<Option<ScoreIdentity>>,
    }

    #[async_trait]
    impl ScoreDatabase for FakeDb {
        async fn get_score_from_token(&self, _token: u64) -> anyhow::Result<Option<ScoreIdentity>> {
            Ok(*self.identity.read().await)
        }
        async fn get_beatmap_checksum(&self, _beatmap_id: u64) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn get_room(&self, _room_id: RoomId) -> anyhow::Result<Option<RoomRecord>> {
            Ok(None)
        }
        async fn save_room(&self, _record: &RoomRecord) -> anyhow::Result<()> {
            Ok(())
        }
        async fn add_playlist_item(&self, _room_id: RoomId, _item: &PlaylistItemRecord) -> anyhow::Result<()> {
            Ok(())
        }
        async fn remove_playlist_item(&self, _room_id: RoomId, _item_id: PlaylistItemId) -> anyhow::Result<()> {
            Ok(())
        }
        async fn update_playlist_item(&self, _room_id: RoomId, _item: &PlaylistItemRecord) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_all_playlist_items(&self, _room_id: RoomId) -> anyhow::Result<Vec<PlaylistItemRecord>> {
            Ok(Vec::new())
        }
        async fn get_updated_beatmap_sets(&self, _since: Option<u32>) -> anyhow::Result<BeatmapSetUpdates> {
            Ok(BeatmapSetUpdates::default())
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        write_count: AtomicUsize,
    }

    #[async_trait]
    impl ScoreStorage for FakeStorage {
        async fn write(&self, _score: &crate::multiplayer::upload::MergedScore) -> anyhow::Result<()> {
            self.write_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn score() -> LocalScore {
        LocalScore {
            user: ApiUser { id: 1, username: "spectator".into() },
            beatmap_id: 1,
            ruleset_id: 0,
            total_score: 0,
            replay: Vec::new(),
        }
    }

    #[tokio::test]
    async fn end_play_session_forwards_token_to_pipeline() {
        let db = Arc::new(FakeDb::default());
        *db.identity.write().await = Some(ScoreIdentity { online_id: 1, passed: true });
        let storage = Arc::new(FakeStorage::default());
        let pipeline = ScoreUploadPipeline::new(
            db,
            storage.clone(),
            super::super::upload::UploadPipelineSettings {
                concurrency: 1,
                timeout: Duration::from_millis(200),
                backoff_min: Duration::from_millis(5),
                backoff_max: Duration::from_millis(10),
            },
            true,
        );

        let tracker = SpectatorSessionTracker::new();
        let user = UserId::new(1);
        tracker.begin_play_session(
            user,
            RoomId::new(1),
            Some(ScoreToken::new(42)),
            SpectatorState { beatmap_id: 1, ruleset_id: 0 },
            score(),
        );
        tracker.send_frame_data(user, &[1, 2, 3]);
        assert!(tracker.is_playing(user));

        tracker.end_play_session(user, PlayCompletion::Passed, &pipeline);
        assert!(!tracker.is_playing(user));

        while pipeline.remaining_usages() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(storage.write_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ending_twice_is_a_no_op_the_second_time() {
        let db = Arc::new(FakeDb::default());
        let storage = Arc::new(FakeStorage::default());
        let pipeline = ScoreUploadPipeline::new(
            db,
            storage,
            super::super::upload::UploadPipelineSettings::default(),
            true,
        );
        let tracker = SpectatorSessionTracker::new();
        let user = UserId::new(1);
        tracker.begin_play_session(user, RoomId::new(1), None, SpectatorState { beatmap_id: 1, ruleset_id: 0 }, score());
        assert!(tracker.end_play_session(user, PlayCompletion::Quit, &pipeline).is_some());
        assert!(tracker.end_play_session(user, PlayCompletion::Quit, &pipeline).is_none());
    }
}
