//! Metadata broadcaster: a single-shot timer that polls the
//! database for beatmap metadata changes and fans the result out to every
//! connected client.
//!
//! Shaped like the existing `cleanup_task` loop in
//! [`crate::server::maintenance`]: `interval.tick()`, do the work, loop.
//! The difference here is the tick is deliberately *not* a fixed
//! `tokio::time::interval` -- the next poll is scheduled only after the
//! current one (including the fan-out) completes, so a slow DB round trip
//! never causes overlapping ticks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::ports::{BeatmapSetUpdates, ScoreDatabase};

/// Narrow fan-out capability the broadcaster needs from the hub: send one
/// event to every currently connected client.
pub trait BroadcastSink: Send + Sync {
    fn broadcast_beatmap_sets_updated(&self, updates: &BeatmapSetUpdates);
}

/// Polls `db.get_updated_beatmap_sets` every `interval` and broadcasts any
/// non-empty result. Exceptions from the database are caught and logged;
/// the timer always restarts.
pub struct MetadataBroadcaster {
    last_queue_id: AtomicU32,
    has_seen_first_id: std::sync::atomic::AtomicBool,
}

impl Default for MetadataBroadcaster {
    fn default() -> Self {
        Self {
            last_queue_id: AtomicU32::new(0),
            has_seen_first_id: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl MetadataBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn cursor(&self) -> Option<u32> {
        if self.has_seen_first_id.load(Ordering::Acquire) {
            Some(self.last_queue_id.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Runs one poll-and-maybe-broadcast tick. Exposed separately from
    /// [`Self::run`] so tests can drive individual ticks deterministically.
    pub async fn tick<D: ScoreDatabase + ?Sized>(&self, db: &D, sink: &dyn BroadcastSink) {
        match db.get_updated_beatmap_sets(self.cursor()).await {
            Ok(updates) => {
                self.last_queue_id
                    .store(updates.last_processed_queue_id, Ordering::Release);
                self.has_seen_first_id.store(true, Ordering::Release);
                if !updates.beatmap_set_ids.is_empty() {
                    info!(count = updates.beatmap_set_ids.len(), "beatmap sets updated");
                    sink.broadcast_beatmap_sets_updated(&updates);
                }
            }
            Err(error) => {
                error!(%error, "metadata broadcaster poll failed");
            }
        }
    }

    /// Runs forever, ticking every `interval` with no overlap between
    /// consecutive ticks, until `shutdown` is cancelled.
    pub async fn run<D: ScoreDatabase + ?Sized>(
        self: Arc<Self>,
        db: Arc<D>,
        sink: Arc<dyn BroadcastSink>,
        interval: Duration,
        shutdown: tokio_util::sync::CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            self.tick(&*db, &*sink).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplayer::ids::{PlaylistItemId, RoomId};
    use crate::multiplayer::ports::{PlaylistItemRecord, RoomRecord, ScoreIdentity};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeDb {
        updates: Mutex<Vec<BeatmapSetUpdates>>,
        calls: Mutex<Vec<Option<u32>>>,
        fail_next: Mutex<bool>,
    }

    #[async_trait]
    impl ScoreDatabase for FakeDb {
        async fn get_score_from_token(&self, _token: u64) -> anyhow::Result<Option<ScoreIdentity>> {
            Ok(None)
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
        async fn get_updated_beatmap_sets(&self, since: Option<u32>) -> anyhow::Result<BeatmapSetUpdates> {
            self.calls.lock().unwrap().push(since);
            if *self.fail_next.lock().unwrap() {
                *self.fail_next.lock().unwrap() = false;
                anyhow::bail!("db unavailable");
            }
            Ok(self.updates.lock().unwrap().pop().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        broadcasts: Mutex<Vec<BeatmapSetUpdates>>,
    }

    impl BroadcastSink for RecordingSink {
        fn broadcast_beatmap_sets_updated(&self, updates: &BeatmapSetUpdates) {
            self.broadcasts.lock().unwrap().push(updates.clone());
        }
    }

    #[tokio::test]
    async fn broadcasts_only_when_sets_are_non_empty() {
        let db = FakeDb {
            updates: Mutex::new(vec![BeatmapSetUpdates {
                last_processed_queue_id: 5,
                beatmap_set_ids: vec![],
            }]),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        };
        let sink = RecordingSink::default();
        let broadcaster = MetadataBroadcaster::new();
        broadcaster.tick(&db, &sink).await;
        assert!(sink.broadcasts.lock().unwrap().is_empty());
        assert_eq!(broadcaster.cursor(), Some(5));
    }

    #[tokio::test]
    async fn advances_cursor_and_broadcasts_non_empty_updates() {
        let db = FakeDb {
            updates: Mutex::new(vec![BeatmapSetUpdates {
                last_processed_queue_id: 10,
                beatmap_set_ids: vec![1, 2, 3],
            }]),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        };
        let sink = RecordingSink::default();
        let broadcaster = MetadataBroadcaster::new();
        broadcaster.tick(&db, &sink).await;
        assert_eq!(sink.broadcasts.lock().unwrap().len(), 1);
        assert_eq!(broadcaster.cursor(), Some(10));
    }

    #[tokio::test]
    async fn a_failed_poll_is_swallowed_and_does_not_advance_cursor() {
        let db = FakeDb {
            updates: Mutex::new(vec![]),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(true),
        };
        let sink = RecordingSink::default();
        let broadcaster = MetadataBroadcaster::new();
        broadcaster.tick(&db, &sink).await;
        assert!(sink.broadcasts.lock().unwrap().is_empty());
        assert_eq!(broadcaster.cursor(), None);
    }

    #[tokio::test]
    async fn first_tick_polls_with_no_cursor() {
        let db = FakeDb {
            updates: Mutex::new(vec![]),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        };
        let sink = RecordingSink::default();
        let broadcaster = MetadataBroadcaster::new();
        broadcaster.tick(&db, &sink).await;
        assert_eq!(db.calls.lock().unwrap().as_slice(), [None]);
    }
}
