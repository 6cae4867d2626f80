//! Countdown manager: per-room typed, cancellable countdowns with a
//! completion continuation that re-acquires the room instead of closing
//! over the caller's lock.
//!
//! Inheritance-based countdown hierarchies in the source become a closed
//! tagged union ([`CountdownKind`]); "find/stop by type" is a tag
//! comparison instead of a type check.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use super::ids::CountdownId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountdownKind {
    MatchStart,
    ServerShuttingDown,
    ForceGameplayStart,
}

#[derive(Debug, Clone)]
pub struct ActiveCountdown {
    pub id: CountdownId,
    pub kind: CountdownKind,
    pub started_at: DateTime<Utc>,
    pub duration: StdDuration,
}

impl ActiveCountdown {
    /// `TimeRemaining` recomputed from wall clock, clamped to zero -- never
    /// trusted as a stored, decaying value.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> StdDuration {
        let elapsed = now
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        self.duration.saturating_sub(elapsed)
    }
}

/// The two cancellation sources plus the one-shot completion signal handed
/// to a caller of `SkipToEndOfCountdown`.
pub struct CountdownHandles {
    pub stop: Arc<Notify>,
    pub skip: Arc<Notify>,
    pub done: Arc<Notify>,
}

/// Per-room set of active countdowns. Holds at most one instance per
/// [`CountdownKind`].
#[derive(Default)]
pub struct CountdownManager {
    active: Vec<ActiveCountdown>,
    handles: HashMap<CountdownId, CountdownHandles>,
    next_id: u64,
}

impl CountdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &[ActiveCountdown] {
        &self.active
    }

    pub fn find_by_kind(&self, kind: CountdownKind) -> Option<&ActiveCountdown> {
        self.active.iter().find(|c| c.kind == kind)
    }

    fn remove(&mut self, id: CountdownId) -> Option<(ActiveCountdown, CountdownHandles)> {
        let idx = self.active.iter().position(|c| c.id == id)?;
        let countdown = self.active.remove(idx);
        let handles = self.handles.remove(&id)?;
        Some((countdown, handles))
    }

    /// Stops any countdown of `kind` already running (signalling `Stop`,
    /// skipping its callback) and starts a fresh one, returning the new
    /// countdown's id and the handles a caller must use to drive it.
    pub fn start(
        &mut self,
        kind: CountdownKind,
        duration: StdDuration,
        now: DateTime<Utc>,
    ) -> (CountdownId, Arc<Notify>, Arc<Notify>, Arc<Notify>) {
        self.stop_kind(kind);

        self.next_id += 1;
        let id = CountdownId::new(self.next_id);
        let handles = CountdownHandles {
            stop: Arc::new(Notify::new()),
            skip: Arc::new(Notify::new()),
            done: Arc::new(Notify::new()),
        };
        let (stop, skip, done) = (
            handles.stop.clone(),
            handles.skip.clone(),
            handles.done.clone(),
        );
        self.active.push(ActiveCountdown {
            id,
            kind,
            started_at: now,
            duration,
        });
        self.handles.insert(id, handles);
        (id, stop, skip, done)
    }

    /// Signals `Stop` on the countdown of `kind`, if any, and removes it
    /// immediately. The `onComplete` continuation never runs.
    pub fn stop_kind(&mut self, kind: CountdownKind) -> Option<CountdownId> {
        let id = self.find_by_kind(kind)?.id;
        self.stop(id)
    }

    pub fn stop(&mut self, id: CountdownId) -> Option<CountdownId> {
        let (_, handles) = self.remove(id)?;
        handles.stop.notify_waiters();
        Some(id)
    }

    /// Signals `Skip`: the scheduled delay resolves immediately and the
    /// continuation runs as if the countdown had elapsed naturally. Returns
    /// the `done` signal the caller must await *after* releasing its own
    /// room usage -- awaiting it while still holding the usage would
    /// deadlock against the continuation's own re-acquire.
    pub fn skip(&mut self, id: CountdownId) -> Option<Arc<Notify>> {
        let handles = self.handles.get(&id)?;
        let done = handles.done.clone();
        handles.skip.notify_waiters();
        Some(done)
    }

    /// Called by the countdown's continuation after it re-acquires the
    /// room. Removes the countdown if still present (it may already have
    /// been removed by a racing `Stop`) and returns it so the caller can
    /// emit `CountdownStopped` before invoking `onComplete`.
    pub fn complete(&mut self, id: CountdownId) -> Option<ActiveCountdown> {
        self.remove(id).map(|(countdown, _)| countdown)
    }

    pub fn contains(&self, id: CountdownId) -> bool {
        self.active.iter().any(|c| c.id == id)
    }

    /// Stops every active countdown, e.g. on room teardown.
    pub fn stop_all(&mut self) {
        let ids: Vec<_> = self.active.iter().map(|c| c.id).collect();
        for id in ids {
            self.stop(id);
        }
    }
}
