//! Configuration for the multiplayer room engine and the score upload pipeline.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_metadata_poll_interval_secs, default_replay_upload_timeout_secs,
    default_replay_uploader_concurrency, default_save_replays, default_upload_backoff_max_ms,
    default_upload_backoff_min_ms,
};

/// Options consumed by the room engine's score upload pipeline and
/// metadata broadcaster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MultiplayerConfig {
    /// Master switch for the upload pipeline. When `false`, enqueued scores
    /// are accepted but never written to storage.
    #[serde(default = "default_save_replays")]
    pub save_replays: bool,

    /// Number of worker coroutines draining the upload queue.
    #[serde(default = "default_replay_uploader_concurrency")]
    pub replay_uploader_concurrency: u32,

    /// Maximum time an enqueued score may wait for its token to resolve
    /// against the database before being dropped.
    #[serde(default = "default_replay_upload_timeout_secs")]
    pub replay_upload_timeout_secs: u64,

    /// Lower bound of the jittered backoff between token-resolution polls.
    #[serde(default = "default_upload_backoff_min_ms")]
    pub upload_backoff_min_ms: u64,

    /// Upper bound of the jittered backoff between token-resolution polls.
    #[serde(default = "default_upload_backoff_max_ms")]
    pub upload_backoff_max_ms: u64,

    /// Interval between metadata broadcaster polls of the database.
    #[serde(default = "default_metadata_poll_interval_secs")]
    pub metadata_poll_interval_secs: u64,
}

impl Default for MultiplayerConfig {
    fn default() -> Self {
        Self {
            save_replays: default_save_replays(),
            replay_uploader_concurrency: default_replay_uploader_concurrency(),
            replay_upload_timeout_secs: default_replay_upload_timeout_secs(),
            upload_backoff_min_ms: default_upload_backoff_min_ms(),
            upload_backoff_max_ms: default_upload_backoff_max_ms(),
            metadata_poll_interval_secs: default_metadata_poll_interval_secs(),
        }
    }
}
