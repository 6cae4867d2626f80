//! Score upload pipeline: a bounded-concurrency consumer that joins
//! a locally captured score with the database-resolved identity of its
//! score token, then writes the merged result to blob storage exactly
//! once or drops it -- never both, never twice.
//!
//! Mirrors the worker-pool-over-a-shared-channel shape the rest of this
//! server uses for its cleanup and reconnection background tasks, but
//! fans out across `Concurrency` workers instead of running solo.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::ports::ScoreDatabase;
use super::ports::ScoreStorage;

/// The client-supplied identity fields a local score carries before its
/// online identity has resolved. Stands in for the source's `APIUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: u64,
    pub username: String,
}

/// The score exactly as captured server-side at play completion, before
/// the database has produced an online identity for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalScore {
    pub user: ApiUser,
    pub beatmap_id: u64,
    pub ruleset_id: i32,
    pub total_score: i64,
    pub replay: Vec<u8>,
}

/// A [`LocalScore`] merged with its database-resolved identity. This, and
/// only this, is what [`ScoreStorage::write`] ever receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedScore {
    pub online_id: u64,
    pub passed: bool,
    pub user: ApiUser,
    pub beatmap_id: u64,
    pub ruleset_id: i32,
    pub total_score: i64,
    pub replay: Vec<u8>,
}

struct ScoreUploadItem {
    token: u64,
    local_score: LocalScore,
    enqueued_at: DateTime<Utc>,
}

/// Tunables the pipeline needs beyond what's in [`crate::config::MultiplayerConfig`]
/// directly -- kept as its own struct so tests can construct tight timeouts
/// without touching the process-wide config.
#[derive(Debug, Clone, Copy)]
pub struct UploadPipelineSettings {
    pub concurrency: u32,
    pub timeout: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for UploadPipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: Duration::from_secs(30),
            backoff_min: Duration::from_millis(50),
            backoff_max: Duration::from_millis(250),
        }
    }
}

/// The score upload pipeline. `Enqueue`s are buffered on an
/// unbounded channel and drained by `Concurrency` workers sharing it.
pub struct ScoreUploadPipeline {
    sender: mpsc::UnboundedSender<ScoreUploadItem>,
    remaining: Arc<AtomicU64>,
    enabled: Arc<AtomicBool>,
    cancellation: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ScoreUploadPipeline {
    pub fn new<D, S>(
        db: Arc<D>,
        storage: Arc<S>,
        settings: UploadPipelineSettings,
        enabled: bool,
    ) -> Arc<Self>
    where
        D: ScoreDatabase + 'static,
        S: ScoreStorage + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel::<ScoreUploadItem>();
        let receiver = Arc::new(Mutex::new(receiver));
        let remaining = Arc::new(AtomicU64::new(0));
        let enabled = Arc::new(AtomicBool::new(enabled));
        let cancellation = CancellationToken::new();

        let mut workers = Vec::with_capacity(settings.concurrency.max(1) as usize);
        for worker_id in 0..settings.concurrency.max(1) {
            let receiver = receiver.clone();
            let db = db.clone();
            let storage = storage.clone();
            let remaining = remaining.clone();
            let enabled = enabled.clone();
            let cancellation = cancellation.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut guard = receiver.lock().await;
                        tokio::select! {
                            biased;
                            () = cancellation.cancelled() => None,
                            item = guard.recv() => item,
                        }
                    };
                    let Some(item) = item else {
                        break;
                    };
                    debug!(worker_id, token = item.token, "picked up score upload item");
                    process_item(item, &*db, &*storage, settings, enabled.load(Ordering::Relaxed)).await;
                    remaining.fetch_sub(1, Ordering::AcqRel);
                }
            }));
        }

        Arc::new(Self {
            sender,
            remaining,
            enabled,
            cancellation,
            workers: Mutex::new(workers),
        })
    }

    /// Updates the master switch. Honored at the next item-pickup
    /// boundary, never mid-item.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Buffers `(token, local_score)` for upload. Never blocks beyond the
    /// unbounded channel send.
    pub fn enqueue(&self, token: u64, local_score: LocalScore) {
        self.remaining.fetch_add(1, Ordering::AcqRel);
        let item = ScoreUploadItem {
            token,
            local_score,
            enqueued_at: Utc::now(),
        };
        // The only way `send` fails is if every worker already returned,
        // which only happens after `dispose`; enqueues after dispose are a
        // caller bug, so we just drop the accounting increment we took.
        if self.sender.send(item).is_err() {
            self.remaining.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Count of items still owned by the pipeline: queued plus in-flight.
    pub fn remaining_usages(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Stops accepting new items and waits for in-flight work to finish.
    pub async fn dispose(&self) {
        self.cancellation.cancel();
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
    }
}

#[instrument(skip(db, storage), fields(token = item.token))]
async fn process_item<D: ScoreDatabase + ?Sized, S: ScoreStorage + ?Sized>(
    item: ScoreUploadItem,
    db: &D,
    storage: &S,
    settings: UploadPipelineSettings,
    enabled: bool,
) {
    let identity = match poll_for_identity(db, item.token, item.enqueued_at, settings).await {
        Some(identity) => identity,
        None => {
            warn!(token = item.token, "score upload timed out");
            return;
        }
    };

    if !enabled {
        debug!(token = item.token, "upload pipeline disabled, dropping resolved score");
        return;
    }

    let merged = MergedScore {
        online_id: identity.online_id,
        passed: identity.passed,
        user: item.local_score.user,
        beatmap_id: item.local_score.beatmap_id,
        ruleset_id: item.local_score.ruleset_id,
        total_score: item.local_score.total_score,
        replay: item.local_score.replay,
    };

    if let Err(error) = storage.write(&merged).await {
        warn!(token = item.token, %error, "storage write failed, score discarded");
    }
}

async fn poll_for_identity<D: ScoreDatabase + ?Sized>(
    db: &D,
    token: u64,
    enqueued_at: DateTime<Utc>,
    settings: UploadPipelineSettings,
) -> Option<super::ports::ScoreIdentity> {
    loop {
        match db.get_score_from_token(token).await {
            Ok(Some(identity)) => return Some(identity),
            Ok(None) => {}
            Err(error) => {
                warn!(token, %error, "database unavailable while polling for score token");
            }
        }
        let elapsed = Utc::now()
            .signed_duration_since(enqueued_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed > settings.timeout {
            return None;
        }
        let jitter_range = settings
            .backoff_max
            .as_millis()
            .saturating_sub(settings.backoff_min.as_millis())
            .max(1) as u64;
        let backoff = settings.backoff_min + Duration::from_millis(fastrand::u64(0..jitter_range));
        tokio::time::sleep(backoff).await;
    }
}
