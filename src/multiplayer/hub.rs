//! Multiplayer hub: the dispatch surface that turns client RPCs into
//! operations against the room registry, acquiring and releasing a
//! [`Usage`] around each one, then fans the resulting [`RoomEvent`]s out
//! over the room group or the narrower gameplay subgroup.
//!
//! The hub never holds a `Usage` across an `.await` on anything other than
//! the room lock itself -- countdown completions are spawned as detached
//! tasks that re-acquire their own usage once the delay elapses, exactly
//! as the deadlock-avoidance rule requires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::broadcaster::BroadcastSink;
use super::countdown::CountdownKind;
use super::ids::{CountdownId, PlaylistItemId, RoomId, UserId};
use super::match_type::{HubContext, MatchRoleData, MatchType, MatchUserRequest};
use super::playlist::BeatmapLookup;
use super::ports::{BeatmapSetUpdates, PlaylistItemRecord, RoomRecord, ScoreDatabase};
use super::registry::RoomRegistry;
use super::room::{Room, RoomEvent, RoomSettings, RoomState, UserState};
use crate::multiplayer::error::RoomError;

/// Narrow fan-out capability the hub needs from the transport layer. The
/// wire framing, connection directory, and serialization format live
/// outside this module's scope; this trait is the seam.
pub trait HubTransport: Send + Sync {
    fn send_to_room(&self, room_id: RoomId, event: &RoomEvent);
    /// `LoadRequested` and other gameplay-only fan-outs go only to users
    /// currently in the gameplay subgroup.
    fn send_load_requested(&self, room_id: RoomId, users: &[UserId]);
}

/// A [`HubTransport`] that only logs, for a standalone instance with no
/// wire framing wired up to the multiplayer hub yet.
#[derive(Default)]
pub struct LoggingTransport;

impl HubTransport for LoggingTransport {
    fn send_to_room(&self, room_id: RoomId, event: &RoomEvent) {
        info!(%room_id, ?event, "room event");
    }
    fn send_load_requested(&self, room_id: RoomId, users: &[UserId]) {
        info!(%room_id, ?users, "load requested");
    }
}

/// Doubles as the [`MetadataBroadcaster`](super::broadcaster::MetadataBroadcaster)'s
/// sink for the same reason: no wire framing is wired up to the multiplayer
/// hub in a standalone instance, so announcements are logged instead.
impl BroadcastSink for LoggingTransport {
    fn broadcast_beatmap_sets_updated(&self, updates: &BeatmapSetUpdates) {
        info!(count = updates.beatmap_set_ids.len(), "beatmap sets updated");
    }
}

/// A [`HubTransport`] that records every call, for tests.
#[derive(Default)]
pub struct RecordingTransport {
    pub room_events: std::sync::Mutex<Vec<(RoomId, String)>>,
    pub load_requests: std::sync::Mutex<Vec<(RoomId, Vec<UserId>)>>,
}

impl HubTransport for RecordingTransport {
    fn send_to_room(&self, room_id: RoomId, event: &RoomEvent) {
        self.room_events
            .lock()
            .unwrap()
            .push((room_id, format!("{event:?}")));
    }
    fn send_load_requested(&self, room_id: RoomId, users: &[UserId]) {
        self.load_requests
            .lock()
            .unwrap()
            .push((room_id, users.to_vec()));
    }
}

struct HubContextImpl {
    registry: Arc<RoomRegistry>,
    transport: Arc<dyn HubTransport>,
}

impl HubContext for HubContextImpl {
    fn notify_room_updated(&self, room_id: RoomId) {
        // Best-effort: a strategy-initiated notification outside of an
        // RPC's own usage window re-acquires its own, short-lived usage.
        let registry = self.registry.clone();
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Some(usage) = registry.get_for_use(room_id).await {
                transport.send_to_room(room_id, &RoomEvent::RoomStateChanged(usage.state()));
            }
        });
    }
}

/// RPC-level failures the hub surfaces to a caller.
pub type HubResult<T> = Result<T, RoomError>;

/// Per-room knobs not owned by any single sub-component.
#[derive(Debug, Clone)]
pub struct RoomCreateOptions {
    pub name: String,
    pub auto_start_duration: Duration,
    pub auto_skip_countdown: bool,
    pub match_type: MatchType,
}

impl Default for RoomCreateOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            auto_start_duration: Duration::from_secs(5),
            auto_skip_countdown: true,
            match_type: MatchType::HeadToHead,
        }
    }
}

/// The dispatch surface. Holds the process-wide room registry and a
/// handle to the transport fan-out; every public method corresponds to one
/// RPC the hub exposes.
pub struct MultiplayerHub {
    registry: Arc<RoomRegistry>,
    transport: Arc<dyn HubTransport>,
    db: Arc<dyn ScoreDatabase>,
    shutting_down: std::sync::atomic::AtomicBool,
}

impl MultiplayerHub {
    pub fn new(transport: Arc<dyn HubTransport>, db: Arc<dyn ScoreDatabase>) -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(RoomRegistry::new()),
            transport,
            db,
            shutting_down: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down
            .store(true, std::sync::atomic::Ordering::Release);
    }

    fn hub_context(self: &Arc<Self>) -> Arc<dyn HubContext> {
        Arc::new(HubContextImpl {
            registry: self.registry.clone(),
            transport: self.transport.clone(),
        })
    }

    /// Delegates to the match-type strategy for a joining user's
    /// initial role data, handing it the narrow [`HubContext`] capability
    /// instead of a back-pointer into the hub or room.
    fn assign_role_on_join(
        self: &Arc<Self>,
        match_type: MatchType,
        existing: &[MatchRoleData],
    ) -> MatchRoleData {
        use super::match_type::{HeadToHeadStrategy, MatchTypeStrategy, TeamVersusStrategy};
        match match_type {
            MatchType::HeadToHead => HeadToHeadStrategy.assign_on_join(existing),
            MatchType::TeamVersus => TeamVersusStrategy::new(self.hub_context()).assign_on_join(existing),
        }
    }

    fn publish(&self, room_id: RoomId, events: Vec<RoomEvent>) {
        for event in &events {
            if let RoomEvent::MatchStarted(users) = event {
                self.transport.send_load_requested(room_id, users);
            }
            self.transport.send_to_room(room_id, event);
        }
    }

    /// `JoinRoom(RoomId)`. Creates the room on first join. Fails
    /// `ServerShuttingDown` if the process is draining.
    #[instrument(skip(self, options))]
    pub async fn join_room(
        self: &Arc<Self>,
        room_id: RoomId,
        user_id: UserId,
        options: RoomCreateOptions,
    ) -> HubResult<RoomState> {
        if self.shutting_down.load(std::sync::atomic::Ordering::Acquire) {
            return Err(RoomError::ServerShuttingDown);
        }
        let settings = RoomSettings {
            name: options.name.clone(),
            auto_start_duration: options.auto_start_duration,
            auto_skip_countdown: options.auto_skip_countdown,
        };
        let match_type = options.match_type;
        let mut usage = self
            .registry
            .get_or_create(room_id, || {
                let mut room = Room::new(room_id, user_id, settings);
                room.set_match_type(match_type);
                room
            })
            .await;

        // `Room::new` already seeds the creating user as host; detect that
        // exact shape (decided under this usage, so no TOCTOU race with a
        // concurrent creator) rather than joining twice.
        let just_created = usage.users().len() == 1 && usage.host() == user_id;
        let events = if just_created {
            Vec::new()
        } else {
            let existing: Vec<MatchRoleData> =
                usage.users().iter().map(|u| u.match_role.clone()).collect();
            let role = self.assign_role_on_join(usage.match_type(), &existing);
            usage.join(user_id, role)?
        };
        let state = usage.state();
        let room_id = usage.id();
        let queue_mode = usage.playlist().mode();
        drop(usage);

        if just_created {
            // Best-effort: a prior record (e.g. a reused room id from a
            // process that crashed before marking it ended) is logged but
            // never blocks admitting the room -- the in-memory state here
            // is always authoritative for a live room.
            match self.db.get_room(room_id).await {
                Ok(Some(existing)) => {
                    info!(%room_id, ended_at = ?existing.ended_at, "reusing previously recorded room id");
                }
                Ok(None) => {}
                Err(e) => warn!(%room_id, error = %e, "failed to look up existing room record"),
            }
            let record = RoomRecord {
                room_id,
                name: options.name,
                host_user_id: user_id,
                queue_mode,
                started_at: Some(Utc::now()),
                ended_at: None,
            };
            if let Err(e) = self.db.save_room(&record).await {
                warn!(%room_id, error = %e, "failed to persist new room record");
            }
        }

        self.publish(room_id, events);
        Ok(state)
    }

    /// `LeaveRoom`. Evicts the room from the registry once empty.
    #[instrument(skip(self))]
    pub async fn leave_room(self: &Arc<Self>, room_id: RoomId, user_id: UserId) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.leave(user_id)?;
        let evicted = self.registry.evict_if_empty(&usage);
        let host_user_id = usage.host();
        let queue_mode = usage.playlist().mode();
        drop(usage);
        self.publish(room_id, events);
        if evicted {
            info!(%room_id, "room evicted after last user left");
            // Best-effort: preserve the rest of the existing record rather
            // than losing it, but an unreadable or missing record never
            // blocks tearing the room down.
            let mut record = match self.db.get_room(room_id).await {
                Ok(Some(existing)) => existing,
                Ok(None) => RoomRecord {
                    room_id,
                    name: String::new(),
                    host_user_id,
                    queue_mode,
                    started_at: None,
                    ended_at: None,
                },
                Err(e) => {
                    warn!(%room_id, error = %e, "failed to look up room record at teardown");
                    RoomRecord {
                        room_id,
                        name: String::new(),
                        host_user_id,
                        queue_mode,
                        started_at: None,
                        ended_at: None,
                    }
                }
            };
            record.ended_at = Some(Utc::now());
            if let Err(e) = self.db.save_room(&record).await {
                warn!(%room_id, error = %e, "failed to persist room teardown marker");
            }
        }
        Ok(())
    }

    /// `ChangeState`. Drives the `MatchStartCountdown` continuation when
    /// the bulk-advance into `Playing` is observed to have happened inside
    /// this call (so hosts relying on auto-start still see the countdown
    /// fire once instead of twice).
    #[instrument(skip(self))]
    pub async fn change_state(
        self: &Arc<Self>,
        room_id: RoomId,
        user_id: UserId,
        requested: UserState,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.request_state_change(user_id, requested, Utc::now())?;
        let all_backed_out = requested == UserState::Idle
            && usage.state() == RoomState::Open
            && usage.gameplay_subgroup().is_empty();
        if all_backed_out {
            usage.countdowns_mut().stop_kind(CountdownKind::MatchStart);
        }
        drop(usage);
        self.publish(room_id, events);
        Ok(())
    }

    /// `ChangeSettings`. Host-only; rejected once the room has left `Open`.
    #[instrument(skip(self, settings))]
    pub async fn change_settings(
        self: &Arc<Self>,
        room_id: RoomId,
        acting: UserId,
        settings: RoomSettings,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.change_settings(acting, settings)?;
        let room_id = usage.id();
        drop(usage);
        self.publish(room_id, events);
        Ok(())
    }

    /// `SendMatchRequest`. A user adjusts their own match-type role data
    /// (e.g. a team change); no-op events if the active match type does not
    /// honor the request.
    #[instrument(skip(self))]
    pub async fn send_match_request(
        self: &Arc<Self>,
        room_id: RoomId,
        user_id: UserId,
        request: MatchUserRequest,
    ) -> HubResult<()> {
        self.apply_match_request(room_id, user_id, request).await
    }

    /// `InvokeMatchRequest`. Host-only: applies a match request on behalf of
    /// another user in the room (e.g. moving a player to balance teams).
    #[instrument(skip(self))]
    pub async fn invoke_match_request(
        self: &Arc<Self>,
        room_id: RoomId,
        acting: UserId,
        target: UserId,
        request: MatchUserRequest,
    ) -> HubResult<()> {
        {
            let usage = self
                .registry
                .get_for_use(room_id)
                .await
                .ok_or(RoomError::RoomNotFound(room_id))?;
            if usage.host() != acting {
                return Err(RoomError::NotAuthorized(acting));
            }
        }
        self.apply_match_request(room_id, target, request).await
    }

    async fn apply_match_request(
        self: &Arc<Self>,
        room_id: RoomId,
        user_id: UserId,
        request: MatchUserRequest,
    ) -> HubResult<()> {
        use super::match_type::{HeadToHeadStrategy, MatchTypeStrategy, TeamVersusStrategy};
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let role = match usage.match_type() {
            MatchType::HeadToHead => HeadToHeadStrategy.handle_user_request(request),
            MatchType::TeamVersus => {
                TeamVersusStrategy::new(self.hub_context()).handle_user_request(request)
            }
        };
        let events = match role {
            Some(role) => usage.set_match_role(user_id, role)?,
            None => Vec::new(),
        };
        let room_id = usage.id();
        drop(usage);
        self.publish(room_id, events);
        Ok(())
    }

    /// `SkipToEndOfCountdown`. Signals `Skip` and awaits completion *after*
    /// releasing this call's own usage, per the deadlock rule.
    #[instrument(skip(self))]
    pub async fn skip_countdown(
        self: &Arc<Self>,
        room_id: RoomId,
        countdown_id: CountdownId,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let done = usage.countdowns_mut().skip(countdown_id);
        drop(usage);
        if let Some(done) = done {
            done.notified().await;
        }
        Ok(())
    }

    /// `StopAnyCountdown`/`StopCountdown`. The continuation's `onComplete`
    /// never runs for a countdown stopped this way.
    #[instrument(skip(self))]
    pub async fn stop_countdown(
        self: &Arc<Self>,
        room_id: RoomId,
        kind: CountdownKind,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        usage.countdowns_mut().stop_kind(kind);
        Ok(())
    }

    /// `StartMatch`. Host-only. Arms a `ForceGameplayStartCountdown` if the
    /// room is configured for it, so a straggler cannot block the match
    /// forever.
    #[instrument(skip(self))]
    pub async fn start_match(self: &Arc<Self>, room_id: RoomId, user_id: UserId) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.start_match(user_id)?;
        let should_arm_force_start = usage.settings().auto_skip_countdown;
        let duration = usage.settings().auto_start_duration;
        let countdown = should_arm_force_start.then(|| {
            usage
                .countdowns_mut()
                .start(CountdownKind::ForceGameplayStart, duration, Utc::now())
        });
        drop(usage);
        self.publish(room_id, events);
        if let Some((id, _stop, skip, done)) = countdown {
            self.spawn_countdown_continuation(room_id, id, duration, skip, done);
        }
        Ok(())
    }

    /// Spawns the detached continuation a `StartCountdown` call schedules:
    /// races the remaining duration against `Skip`, then re-acquires a
    /// *fresh* usage and runs the completion logic -- never the usage the
    /// caller that started the countdown was holding. A `Stop` signal needs
    /// no branch here: `CountdownManager::stop` already removes the entry,
    /// so `complete` below simply returns `None` and this task gives up.
    fn spawn_countdown_continuation(
        self: &Arc<Self>,
        room_id: RoomId,
        countdown_id: CountdownId,
        duration: Duration,
        skip: Arc<tokio::sync::Notify>,
        done: Arc<tokio::sync::Notify>,
    ) {
        let hub = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = skip.notified() => {}
                () = tokio::time::sleep(duration) => {}
            }
            let result: Option<()> = async {
                let mut usage = hub.registry.get_for_use(room_id).await?;
                usage.countdowns_mut().complete(countdown_id)?;
                let advanced = usage.force_advance_to_playing();
                let room_id = usage.id();
                let events = if advanced {
                    vec![RoomEvent::RoomStateChanged(usage.state())]
                } else {
                    Vec::new()
                };
                drop(usage);
                hub.publish(room_id, events);
                Some(())
            }
            .await;
            let _ = result;
            done.notify_waiters();
        });
    }

    /// `AddPlaylistItem`.
    #[instrument(skip(self))]
    pub async fn add_playlist_item(
        self: &Arc<Self>,
        room_id: RoomId,
        user_id: UserId,
        beatmap_id: u64,
        checksum: String,
        ruleset_id: i32,
    ) -> HubResult<PlaylistItemId> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let host = usage.host();
        let known_checksum = self
            .db
            .get_beatmap_checksum(beatmap_id)
            .await
            .map_err(|e| RoomError::DatabaseUnavailable(e.to_string()))?;
        let lookup = known_checksum
            .as_deref()
            .map(|checksum| BeatmapLookup { checksum });
        let item_id = usage.playlist_mut().add_item(
            user_id,
            host,
            beatmap_id,
            &checksum,
            ruleset_id,
            lookup,
        )?;
        let record = usage
            .playlist()
            .items()
            .iter()
            .find(|item| item.id == item_id)
            .map(|item| PlaylistItemRecord {
                id: item.id,
                owner_user_id: item.owner_user_id,
                beatmap_id: item.beatmap_id,
                beatmap_checksum: item.beatmap_checksum.clone(),
                ruleset_id: item.ruleset_id,
                expired: item.expired,
            })
            .expect("item was just added above");
        let room_id = usage.id();
        drop(usage);
        // Best-effort mirror: the in-memory playlist is authoritative for
        // this process, so a failed write here is logged and swallowed
        // rather than unwinding an already-applied mutation.
        if let Err(e) = self.db.add_playlist_item(room_id, &record).await {
            warn!(%room_id, %item_id, error = %e, "failed to persist added playlist item");
        }
        self.publish(room_id, vec![RoomEvent::PlaylistItemAdded(item_id)]);
        Ok(item_id)
    }

    /// `RemovePlaylistItem`.
    #[instrument(skip(self))]
    pub async fn remove_playlist_item(
        self: &Arc<Self>,
        room_id: RoomId,
        user_id: UserId,
        item_id: PlaylistItemId,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let host = usage.host();
        usage.playlist_mut().remove_item(user_id, host, item_id)?;
        let room_id = usage.id();
        drop(usage);
        if let Err(e) = self.db.remove_playlist_item(room_id, item_id).await {
            warn!(%room_id, %item_id, error = %e, "failed to persist removed playlist item");
        }
        self.publish(room_id, vec![RoomEvent::PlaylistItemRemoved(item_id)]);
        Ok(())
    }

    /// Host authority ops, kept together since they share the same
    /// "re-validate host, mutate, publish" shape.
    #[instrument(skip(self))]
    pub async fn reassign_host(
        self: &Arc<Self>,
        room_id: RoomId,
        acting: UserId,
        new_host: UserId,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.reassign_host(acting, new_host)?;
        let room_id = usage.id();
        drop(usage);
        self.publish(room_id, events);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn kick_user(
        self: &Arc<Self>,
        room_id: RoomId,
        acting: UserId,
        target: UserId,
    ) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.kick(acting, target)?;
        let evicted = self.registry.evict_if_empty(&usage);
        let room_id = usage.id();
        drop(usage);
        self.publish(room_id, events);
        let _ = evicted;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn close_room(self: &Arc<Self>, room_id: RoomId, acting: UserId) -> HubResult<()> {
        let mut usage = self
            .registry
            .get_for_use(room_id)
            .await
            .ok_or(RoomError::RoomNotFound(room_id))?;
        let events = usage.close(acting)?;
        let room_id = usage.id();
        drop(usage);
        self.publish(room_id, events);
        Ok(())
    }

    /// Exposes a read-only snapshot for serialization to a newly joined
    /// observer: countdown `TimeRemaining` is recomputed from the
    /// wall clock at call time, never trusted as a stored value.
    pub async fn snapshot(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        let usage = self.registry.get_for_use(room_id).await?;
        let now = Utc::now();
        Some(RoomSnapshot {
            room_id: usage.id(),
            state: usage.state(),
            host: usage.host(),
            users: usage
                .users()
                .iter()
                .map(|u| (u.user_id, u.state))
                .collect(),
            countdowns: usage
                .countdowns()
                .active()
                .iter()
                .map(|c| (c.kind, c.time_remaining(now)))
                .collect(),
        })
    }
}

/// Read-only room view handed to a newly joined observer.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub state: RoomState,
    pub host: UserId,
    pub users: Vec<(UserId, UserState)>,
    pub countdowns: Vec<(CountdownKind, Duration)>,
}
