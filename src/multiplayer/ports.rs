//! External collaborators the room engine consumes but does not own: the
//! relational database and the blob store. Both are modeled as
//! narrow `async_trait` ports, the same shape [`crate::database::GameDatabase`]
//! uses for the legacy signaling server, so production code swaps in a real
//! driver behind the same seam tests fake out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PlaylistItemId, RoomId, UserId};
use super::playlist::QueueMode;

/// What the database resolved a score token to: the online identity
/// assigned once a play's score row exists, plus whether it passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreIdentity {
    pub online_id: u64,
    pub passed: bool,
}

/// A room record as persisted at creation time and updated with
/// `StartedAt`/`EndedAt` markers across its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub name: String,
    pub host_user_id: UserId,
    pub queue_mode: QueueMode,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A mirrored playlist item row, as read back via `GetAllPlaylistItems`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItemRecord {
    pub id: PlaylistItemId,
    pub owner_user_id: UserId,
    pub beatmap_id: u64,
    pub beatmap_checksum: String,
    pub ruleset_id: i32,
    pub expired: bool,
}

/// Result of polling for beatmap metadata changes since a given queue
/// cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatmapSetUpdates {
    pub last_processed_queue_id: u32,
    pub beatmap_set_ids: Vec<u64>,
}

/// The database port: score identity lookups, beatmap
/// checksums, room/playlist persistence, and the metadata broadcaster's
/// polling query. Every method is a single round-trip; callers apply their
/// own retry-once-with-jitter policy rather than this trait retrying
/// internally.
#[async_trait]
pub trait ScoreDatabase: Send + Sync {
    /// Resolves a score token to its online identity, or `None` if the
    /// corresponding score row has not landed yet.
    async fn get_score_from_token(&self, token: u64) -> anyhow::Result<Option<ScoreIdentity>>;

    /// Looks up the canonical checksum for a beatmap, or `None` if the
    /// beatmap is unknown to this instance.
    async fn get_beatmap_checksum(&self, beatmap_id: u64) -> anyhow::Result<Option<String>>;

    async fn get_room(&self, room_id: RoomId) -> anyhow::Result<Option<RoomRecord>>;

    async fn save_room(&self, record: &RoomRecord) -> anyhow::Result<()>;

    async fn add_playlist_item(
        &self,
        room_id: RoomId,
        item: &PlaylistItemRecord,
    ) -> anyhow::Result<()>;

    async fn remove_playlist_item(
        &self,
        room_id: RoomId,
        item_id: PlaylistItemId,
    ) -> anyhow::Result<()>;

    async fn update_playlist_item(
        &self,
        room_id: RoomId,
        item: &PlaylistItemRecord,
    ) -> anyhow::Result<()>;

    async fn get_all_playlist_items(
        &self,
        room_id: RoomId,
    ) -> anyhow::Result<Vec<PlaylistItemRecord>>;

    /// Polls for beatmap sets updated since `since` (the broadcaster's
    /// last seen queue id, `None` on first tick).
    async fn get_updated_beatmap_sets(
        &self,
        since: Option<u32>,
    ) -> anyhow::Result<BeatmapSetUpdates>;
}

/// The storage port: the single write operation the upload
/// pipeline invokes once a score's identity has resolved. Any error is
/// terminal for that item -- the pipeline never retries.
#[async_trait]
pub trait ScoreStorage: Send + Sync {
    async fn write(&self, score: &super::upload::MergedScore) -> anyhow::Result<()>;
}

/// Zero-dependency default for both ports, mirroring
/// [`crate::database::InMemoryDatabase`]: scores resolve the instant a token
/// is registered via [`Self::register_token`], and writes are kept in
/// memory rather than shipped anywhere. Good enough for a standalone
/// instance with no external beatmap/score database configured.
#[derive(Default)]
pub struct InMemoryScoreDatabase {
    tokens: dashmap::DashMap<u64, ScoreIdentity>,
    checksums: dashmap::DashMap<u64, String>,
    rooms: dashmap::DashMap<RoomId, RoomRecord>,
    playlist_items: dashmap::DashMap<RoomId, Vec<PlaylistItemRecord>>,
}

impl InMemoryScoreDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the identity a subsequent `get_score_from_token` resolves
    /// to. Stands in for the row landing in a real scores table.
    pub fn register_token(&self, token: u64, identity: ScoreIdentity) {
        self.tokens.insert(token, identity);
    }

    /// Seeds a known beatmap checksum, stood in for a real beatmap mirror.
    pub fn register_beatmap(&self, beatmap_id: u64, checksum: impl Into<String>) {
        self.checksums.insert(beatmap_id, checksum.into());
    }
}

#[async_trait]
impl ScoreDatabase for InMemoryScoreDatabase {
    async fn get_score_from_token(&self, token: u64) -> anyhow::Result<Option<ScoreIdentity>> {
        Ok(self.tokens.get(&token).map(|entry| *entry))
    }

    async fn get_beatmap_checksum(&self, beatmap_id: u64) -> anyhow::Result<Option<String>> {
        Ok(self.checksums.get(&beatmap_id).map(|entry| entry.clone()))
    }

    async fn get_room(&self, room_id: RoomId) -> anyhow::Result<Option<RoomRecord>> {
        Ok(self.rooms.get(&room_id).map(|entry| entry.clone()))
    }

    async fn save_room(&self, record: &RoomRecord) -> anyhow::Result<()> {
        self.rooms.insert(record.room_id, record.clone());
        Ok(())
    }

    async fn add_playlist_item(
        &self,
        room_id: RoomId,
        item: &PlaylistItemRecord,
    ) -> anyhow::Result<()> {
        self.playlist_items.entry(room_id).or_default().push(item.clone());
        Ok(())
    }

    async fn remove_playlist_item(
        &self,
        room_id: RoomId,
        item_id: PlaylistItemId,
    ) -> anyhow::Result<()> {
        if let Some(mut items) = self.playlist_items.get_mut(&room_id) {
            items.retain(|item| item.id != item_id);
        }
        Ok(())
    }

    async fn update_playlist_item(
        &self,
        room_id: RoomId,
        item: &PlaylistItemRecord,
    ) -> anyhow::Result<()> {
        if let Some(mut items) = self.playlist_items.get_mut(&room_id) {
            if let Some(existing) = items.iter_mut().find(|existing| existing.id == item.id) {
                *existing = item.clone();
            }
        }
        Ok(())
    }

    async fn get_all_playlist_items(
        &self,
        room_id: RoomId,
    ) -> anyhow::Result<Vec<PlaylistItemRecord>> {
        Ok(self
            .playlist_items
            .get(&room_id)
            .map(|items| items.clone())
            .unwrap_or_default())
    }

    async fn get_updated_beatmap_sets(
        &self,
        _since: Option<u32>,
    ) -> anyhow::Result<BeatmapSetUpdates> {
        // No external metadata feed is wired up for the zero-dependency
        // default; the broadcaster simply never has anything to announce.
        Ok(BeatmapSetUpdates::default())
    }
}

/// Discards every write. Used when `multiplayer.save_replays` is `false` or
/// no real blob store is configured.
#[derive(Default)]
pub struct NullScoreStorage;

#[async_trait]
impl ScoreStorage for NullScoreStorage {
    async fn write(&self, _score: &super::upload::MergedScore) -> anyhow::Result<()> {
        Ok(())
    }
}
