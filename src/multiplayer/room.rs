//! Room state machine: the user set, per-user state, host authority,
//! and the state transitions that drive a room through its ready/load/play
//! /results cycle.
//!
//! A `Room` never talks to the network or the database directly. Every
//! operation here returns the [`RoomEvent`]s a caller should fan out once
//! it releases its [`super::registry::Usage`] -- the room itself only
//! decides *what* changed, never *who* to tell.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::countdown::CountdownManager;
use super::error::RoomError;
use super::ids::{PlaylistItemId, RoomId, UserId};
use super::match_type::{MatchRoleData, MatchType};
use super::playlist::{PlaylistQueue, QueueMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Open,
    WaitingForLoad,
    Playing,
    Closed,
}

/// Per-user state in the ready/load/play/results cycle. `Spectating` is listed for wire
/// completeness but a `RoomUser` never actually holds it -- spectators are
/// tracked by the spectator session component and have no `RoomUser` entry
/// at all (see DESIGN.md's note on this open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    Idle,
    Ready,
    WaitingForLoad,
    Loaded,
    ReadyForGameplay,
    Playing,
    FinishedPlay,
    Results,
    Spectating,
}

impl UserState {
    /// States a client may request directly via `ChangeState`. The three
    /// remaining states are server-driven only.
    fn is_client_requestable(self) -> bool {
        matches!(
            self,
            UserState::Idle | UserState::Ready | UserState::Loaded | UserState::ReadyForGameplay | UserState::FinishedPlay
        )
    }

    /// `Loaded` and `ReadyForGameplay` both count as "ready to play" when
    /// deciding whether the gameplay subgroup can bulk-advance to `Playing`.
    fn counts_as_loaded(self) -> bool {
        matches!(self, UserState::Loaded | UserState::ReadyForGameplay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomUser {
    pub user_id: UserId,
    pub state: UserState,
    pub ruleset_id: Option<i32>,
    pub match_role: MatchRoleData,
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub name: String,
    /// How long a `MatchStartCountdown` runs once armed; zero disables
    /// auto-start entirely and `StartMatch` must be called directly.
    pub auto_start_duration: Duration,
    /// Whether a `ForceGameplayStartCountdown` is armed when the first
    /// user finishes loading, to avoid an indefinite wait on stragglers.
    pub auto_skip_countdown: bool,
}

/// Events a caller should translate into fan-out messages after releasing
/// its usage of the room. Deliberately ignorant of the wire format.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    UserJoined(UserId),
    UserLeft(UserId),
    UserStateChanged(UserId, UserState),
    HostChanged(UserId),
    RoomStateChanged(RoomState),
    /// Users who actually started loading; the hub sends `LoadRequested`
    /// to exactly this subgroup.
    MatchStarted(Vec<UserId>),
    ResultsReady(Vec<UserId>),
    RoomClosed,
    PlaylistItemAdded(PlaylistItemId),
    PlaylistItemRemoved(PlaylistItemId),
    PlaylistItemChanged(PlaylistItemId),
    SettingsChanged,
    MatchRoleChanged(UserId),
}

pub struct Room {
    id: RoomId,
    host: UserId,
    state: RoomState,
    users: Vec<RoomUser>,
    settings: RoomSettings,
    playlist: PlaylistQueue,
    countdowns: CountdownManager,
    gameplay_subgroup: HashSet<UserId>,
    playing_set: HashSet<UserId>,
    match_type: MatchType,
}

impl Room {
    /// A room comes into existence on the first `JoinRoom` for a not yet
    /// known `RoomId`; that caller becomes host and its first member.
    pub fn new(id: RoomId, host: UserId, settings: RoomSettings) -> Self {
        let mut room = Self {
            id,
            host,
            state: RoomState::Open,
            users: Vec::new(),
            settings,
            playlist: PlaylistQueue::new(QueueMode::HostOnly),
            countdowns: CountdownManager::new(),
            gameplay_subgroup: HashSet::new(),
            playing_set: HashSet::new(),
            match_type: MatchType::HeadToHead,
        };
        room.users.push(RoomUser {
            user_id: host,
            state: UserState::Idle,
            ruleset_id: None,
            match_role: MatchRoleData::default(),
        });
        room
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn host(&self) -> UserId {
        self.host
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn users(&self) -> &[RoomUser] {
        &self.users
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn playlist(&self) -> &PlaylistQueue {
        &self.playlist
    }

    pub fn playlist_mut(&mut self) -> &mut PlaylistQueue {
        &mut self.playlist
    }

    pub fn countdowns(&self) -> &CountdownManager {
        &self.countdowns
    }

    pub fn countdowns_mut(&mut self) -> &mut CountdownManager {
        &mut self.countdowns
    }

    pub fn gameplay_subgroup(&self) -> &HashSet<UserId> {
        &self.gameplay_subgroup
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn set_match_type(&mut self, match_type: MatchType) {
        self.match_type = match_type;
    }

    /// `ChangeSettings`. Host-only; applies only while the room is `Open` so
    /// a change never lands mid-match.
    pub fn change_settings(&mut self, acting: UserId, settings: RoomSettings) -> Result<Vec<RoomEvent>, RoomError> {
        if acting != self.host {
            return Err(RoomError::NotAuthorized(acting));
        }
        if self.state != RoomState::Open {
            return Err(RoomError::InvalidState(format!(
                "room {} settings cannot change once a match has started",
                self.id
            )));
        }
        self.settings = settings;
        Ok(vec![RoomEvent::SettingsChanged])
    }

    /// Overwrites a joined user's match-type role data, e.g. after a
    /// `SendMatchRequest`/`InvokeMatchRequest` such as a team change.
    pub fn set_match_role(&mut self, user_id: UserId, role: MatchRoleData) -> Result<Vec<RoomEvent>, RoomError> {
        let user = self
            .find_user_mut(user_id)
            .ok_or(RoomError::UserNotFound(user_id, self.id))?;
        user.match_role = role;
        Ok(vec![RoomEvent::MatchRoleChanged(user_id)])
    }

    fn find_user(&self, user_id: UserId) -> Option<&RoomUser> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    fn find_user_mut(&mut self, user_id: UserId) -> Option<&mut RoomUser> {
        self.users.iter_mut().find(|u| u.user_id == user_id)
    }

    pub fn user_state(&self, user_id: UserId) -> Option<UserState> {
        self.find_user(user_id).map(|u| u.state)
    }

    /// `State = Open ⇔ no user in {WaitingForLoad, Loaded, Playing}`,
    /// `State = WaitingForLoad ⇔ ≥1 WaitingForLoad and none Playing`,
    /// `State = Playing ⇔ ≥1 user in {Loaded, Playing}`. `Closed` is
    /// sticky once set by [`Room::close`] and is never recomputed away.
    fn recompute_state(&mut self) -> bool {
        if self.state == RoomState::Closed {
            return false;
        }
        let any_waiting = self
            .users
            .iter()
            .any(|u| u.state == UserState::WaitingForLoad);
        let any_playing = self.users.iter().any(|u| u.state == UserState::Playing);
        let any_loaded_or_playing = self
            .users
            .iter()
            .any(|u| u.state == UserState::Loaded || u.state == UserState::Playing);

        let next = if any_loaded_or_playing {
            RoomState::Playing
        } else if any_waiting && !any_playing {
            RoomState::WaitingForLoad
        } else {
            RoomState::Open
        };
        if next != self.state {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Adds `user` to the room. Fails `InvalidState` if already joined.
    pub fn join(&mut self, user_id: UserId, role: MatchRoleData) -> Result<Vec<RoomEvent>, RoomError> {
        if self.find_user(user_id).is_some() {
            return Err(RoomError::InvalidState(format!(
                "user {user_id} has already joined room {}",
                self.id
            )));
        }
        self.users.push(RoomUser {
            user_id,
            state: UserState::Idle,
            ruleset_id: None,
            match_role: role,
        });
        Ok(vec![RoomEvent::UserJoined(user_id)])
    }

    /// Removes `user`, reassigning host to the next user in insertion
    /// order if the leaving user was host, and recomputes the aggregate
    /// room state per the "implicit Idle then removal" rule.
    pub fn leave(&mut self, user_id: UserId) -> Result<Vec<RoomEvent>, RoomError> {
        let idx = self
            .users
            .iter()
            .position(|u| u.user_id == user_id)
            .ok_or(RoomError::UserNotFound(user_id, self.id))?;
        self.users.remove(idx);
        self.gameplay_subgroup.remove(&user_id);
        self.playing_set.remove(&user_id);

        let mut events = vec![RoomEvent::UserLeft(user_id)];
        if self.host == user_id {
            if let Some(next) = self.users.first() {
                self.host = next.user_id;
                events.push(RoomEvent::HostChanged(self.host));
            }
        }
        if self.recompute_state() {
            events.push(RoomEvent::RoomStateChanged(self.state));
        }
        Ok(events)
    }

    /// `ChangeState` from a client. Rejects server-only target states with
    /// `InvalidStateChange`. A request for the user's current state is a
    /// no-op and emits no event.
    pub fn request_state_change(
        &mut self,
        user_id: UserId,
        requested: UserState,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, RoomError> {
        if !requested.is_client_requestable() {
            return Err(RoomError::InvalidStateChange(format!("{requested:?}")));
        }
        let user = self
            .find_user_mut(user_id)
            .ok_or(RoomError::UserNotFound(user_id, self.id))?;
        if user.state == requested {
            return Ok(Vec::new());
        }
        user.state = requested;
        let mut events = vec![RoomEvent::UserStateChanged(user_id, requested)];

        if requested == UserState::Loaded || requested == UserState::ReadyForGameplay {
            // Deliberately does not call `recompute_state` here: the
            // `State = Playing ⇔ ≥1 user in {Loaded, Playing}` would make
            // the room briefly "Playing" while other gameplay-subgroup
            // members are still `WaitingForLoad`. The room's externally
            // visible state only moves once the whole subgroup clears the
            // bulk check in `bulk_advance`.
            if self.try_bulk_advance_to_playing(now) {
                events.push(RoomEvent::RoomStateChanged(self.state));
            }
        } else if requested == UserState::FinishedPlay {
            self.gameplay_subgroup.remove(&user_id);
            if let Some(ready) = self.try_bulk_advance_to_results(now) {
                events.push(RoomEvent::ResultsReady(ready));
                events.push(RoomEvent::RoomStateChanged(self.state));
                if let Some(next) = self.playlist.finish_current_item(self.host, now) {
                    events.push(RoomEvent::PlaylistItemChanged(next));
                }
            }
        } else if self.recompute_state() {
            events.push(RoomEvent::RoomStateChanged(self.state));
        }
        Ok(events)
    }

    /// `StartMatch`: host-only, requires the room `Open` and ≥1 `Ready`
    /// user. Only `Ready` users transition to `WaitingForLoad`; everyone
    /// else stays `Idle` and is excluded from the gameplay subgroup.
    pub fn start_match(&mut self, acting: UserId) -> Result<Vec<RoomEvent>, RoomError> {
        if acting != self.host {
            return Err(RoomError::NotAuthorized(acting));
        }
        if self.state != RoomState::Open {
            return Err(RoomError::InvalidState(format!(
                "room {} has already started",
                self.id
            )));
        }
        let starters: Vec<UserId> = self
            .users
            .iter()
            .filter(|u| u.state == UserState::Ready)
            .map(|u| u.user_id)
            .collect();
        if starters.is_empty() {
            return Err(RoomError::InvalidState(format!(
                "room {} has no ready users",
                self.id
            )));
        }
        for &user_id in &starters {
            if let Some(user) = self.find_user_mut(user_id) {
                user.state = UserState::WaitingForLoad;
            }
            self.gameplay_subgroup.insert(user_id);
        }
        self.recompute_state();
        Ok(vec![
            RoomEvent::MatchStarted(starters),
            RoomEvent::RoomStateChanged(self.state),
        ])
    }

    /// Bulk-transitions the gameplay subgroup to `Playing` once every
    /// member has reported `Loaded`/`ReadyForGameplay`, or unconditionally
    /// when `force` is set (the `ForceGameplayStartCountdown` path).
    fn bulk_advance(&mut self, force: bool) -> bool {
        if self.gameplay_subgroup.is_empty() {
            return false;
        }
        let all_ready = force
            || self.gameplay_subgroup.iter().all(|id| {
                self.find_user(*id)
                    .map(|u| u.state.counts_as_loaded())
                    .unwrap_or(true)
            });
        if !all_ready {
            return false;
        }
        for &user_id in &self.gameplay_subgroup {
            if let Some(user) = self.find_user_mut(user_id) {
                if user.state == UserState::WaitingForLoad || user.state.counts_as_loaded() {
                    user.state = UserState::Playing;
                }
            }
        }
        self.playing_set = self.gameplay_subgroup.clone();
        self.recompute_state();
        true
    }

    fn try_bulk_advance_to_playing(&mut self, _now: DateTime<Utc>) -> bool {
        self.bulk_advance(false)
    }

    /// Invoked by the `ForceGameplayStartCountdown` completion callback:
    /// every remaining subgroup member (loaded or not) is forced into
    /// `Playing`.
    pub fn force_advance_to_playing(&mut self) -> bool {
        self.bulk_advance(true)
    }

    fn try_bulk_advance_to_results(&mut self, _now: DateTime<Utc>) -> Option<Vec<UserId>> {
        if self.playing_set.is_empty() {
            return None;
        }
        let all_finished = self.playing_set.iter().all(|id| {
            self.find_user(*id)
                .map(|u| u.state == UserState::FinishedPlay)
                .unwrap_or(true)
        });
        if !all_finished {
            return None;
        }
        let finished: Vec<UserId> = self.playing_set.iter().copied().collect();
        for &user_id in &finished {
            if let Some(user) = self.find_user_mut(user_id) {
                user.state = UserState::Results;
            }
        }
        self.playing_set.clear();
        self.recompute_state();
        Some(finished)
    }

    /// Acks a `Results` screen back to `Idle`, per the cycle diagram.
    pub fn ack_results(&mut self, user_id: UserId) -> Result<Vec<RoomEvent>, RoomError> {
        let user = self
            .find_user_mut(user_id)
            .ok_or(RoomError::UserNotFound(user_id, self.id))?;
        if user.state != UserState::Results {
            return Ok(Vec::new());
        }
        user.state = UserState::Idle;
        Ok(vec![RoomEvent::UserStateChanged(user_id, UserState::Idle)])
    }

    pub fn reassign_host(&mut self, acting: UserId, new_host: UserId) -> Result<Vec<RoomEvent>, RoomError> {
        if acting != self.host {
            return Err(RoomError::NotAuthorized(acting));
        }
        if self.find_user(new_host).is_none() {
            return Err(RoomError::UserNotFound(new_host, self.id));
        }
        self.host = new_host;
        Ok(vec![RoomEvent::HostChanged(new_host)])
    }

    pub fn kick(&mut self, acting: UserId, target: UserId) -> Result<Vec<RoomEvent>, RoomError> {
        if acting != self.host {
            return Err(RoomError::NotAuthorized(acting));
        }
        if acting == target {
            return Err(RoomError::InvalidState("host cannot kick itself".into()));
        }
        self.leave(target)
    }

    pub fn close(&mut self, acting: UserId) -> Result<Vec<RoomEvent>, RoomError> {
        if acting != self.host {
            return Err(RoomError::NotAuthorized(acting));
        }
        self.state = RoomState::Closed;
        self.countdowns.stop_all();
        Ok(vec![RoomEvent::RoomClosed])
    }
}
