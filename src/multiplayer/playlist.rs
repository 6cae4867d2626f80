//! Playlist queue: the per-room ordered list of playlist items, queue
//! mode policy, expiration, and the "current item" pointer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::RoomError;
use super::ids::{PlaylistItemId, UserId, MAX_LEGACY_RULESET_ID};

/// Governs who may add items and the order in which they are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    HostOnly,
    AllPlayers,
    AllPlayersRoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    pub owner_user_id: UserId,
    pub beatmap_id: u64,
    pub beatmap_checksum: String,
    pub ruleset_id: i32,
    pub expired: bool,
    pub played_at: Option<DateTime<Utc>>,
}

/// Event emitted after a successful playlist mutation, while the room
/// usage is still held.
#[derive(Debug, Clone)]
pub enum PlaylistEvent {
    Added(PlaylistItemId),
    Removed(PlaylistItemId),
    Changed(PlaylistItemId),
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistQueue {
    mode: QueueMode_,
    items: Vec<PlaylistItem>,
    next_item_id: u64,
    /// `Settings.PlaylistItemId` -- the current (unexpired) item, if any.
    current_item_id: Option<PlaylistItemId>,
}

// Newtype indirection keeps `Default` derivable without picking an
// arbitrary default queue mode by hand below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueMode_(QueueMode);

impl Default for QueueMode_ {
    fn default() -> Self {
        QueueMode_(QueueMode::HostOnly)
    }
}

pub struct BeatmapLookup<'a> {
    pub checksum: &'a str,
}

impl PlaylistQueue {
    pub fn new(mode: QueueMode) -> Self {
        Self {
            mode: QueueMode_(mode),
            items: Vec::new(),
            next_item_id: 1,
            current_item_id: None,
        }
    }

    pub fn mode(&self) -> QueueMode {
        self.mode.0
    }

    pub fn set_mode(&mut self, mode: QueueMode) {
        self.mode.0 = mode;
    }

    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn current_item_id(&self) -> Option<PlaylistItemId> {
        self.current_item_id
    }

    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.current_item_id
            .and_then(|id| self.items.iter().find(|i| i.id == id))
    }

    fn find(&self, id: PlaylistItemId) -> Option<&PlaylistItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn find_mut(&mut self, id: PlaylistItemId) -> Option<&mut PlaylistItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Adds a new item, validating beatmap checksum and ruleset id against
    /// the database-resolved lookup, and the queue-mode authority rule.
    pub fn add_item(
        &mut self,
        user: UserId,
        host: UserId,
        beatmap_id: u64,
        checksum: &str,
        ruleset_id: i32,
        lookup: Option<BeatmapLookup<'_>>,
    ) -> Result<PlaylistItemId, RoomError> {
        if self.mode.0 == QueueMode::HostOnly && user != host {
            return Err(RoomError::NotAuthorized(user));
        }
        if !(0..=MAX_LEGACY_RULESET_ID).contains(&ruleset_id) {
            return Err(RoomError::InvalidState(format!(
                "ruleset id {ruleset_id} is out of the legacy range"
            )));
        }
        match lookup {
            Some(looked_up) if looked_up.checksum == checksum => {}
            _ => {
                return Err(RoomError::InvalidState(format!(
                    "beatmap {beatmap_id} checksum mismatch or unknown"
                )));
            }
        }

        let id = PlaylistItemId::new(self.next_item_id);
        self.next_item_id += 1;
        let is_first = self.current_item_id.is_none();
        self.items.push(PlaylistItem {
            id,
            owner_user_id: user,
            beatmap_id,
            beatmap_checksum: checksum.to_string(),
            ruleset_id,
            expired: false,
            played_at: None,
        });
        if is_first {
            self.current_item_id = Some(id);
        }
        Ok(id)
    }

    /// Authority check shared by remove and edit: the not-in-this-room
    /// check runs first (a `NotFound`-flavored precondition) and only then
    /// the ownership/host authority check.
    fn check_mutable(&self, user: UserId, host: UserId, item_id: PlaylistItemId) -> Result<(), RoomError> {
        let item = self
            .find(item_id)
            .ok_or(RoomError::InvalidState(format!(
                "item {item_id} does not belong to this room"
            )))?;
        if item.id == self.current_item_id.unwrap_or(PlaylistItemId::new(0)) {
            return Err(RoomError::InvalidState(format!(
                "item {item_id} is the current item"
            )));
        }
        if item.expired {
            return Err(RoomError::InvalidState(format!("item {item_id} is expired")));
        }
        if item.owner_user_id != user && user != host {
            return Err(RoomError::InvalidState(format!(
                "item {item_id} is not owned by user {user} and user is not host"
            )));
        }
        Ok(())
    }

    pub fn remove_item(
        &mut self,
        user: UserId,
        host: UserId,
        item_id: PlaylistItemId,
    ) -> Result<(), RoomError> {
        self.check_mutable(user, host, item_id)?;
        self.items.retain(|i| i.id != item_id);
        Ok(())
    }

    pub fn edit_item(
        &mut self,
        user: UserId,
        host: UserId,
        item_id: PlaylistItemId,
        beatmap_id: u64,
        checksum: &str,
        ruleset_id: i32,
        lookup: Option<BeatmapLookup<'_>>,
    ) -> Result<(), RoomError> {
        self.check_mutable(user, host, item_id)?;
        if !(0..=MAX_LEGACY_RULESET_ID).contains(&ruleset_id) {
            return Err(RoomError::InvalidState(format!(
                "ruleset id {ruleset_id} is out of the legacy range"
            )));
        }
        match lookup {
            Some(looked_up) if looked_up.checksum == checksum => {}
            _ => {
                return Err(RoomError::InvalidState(format!(
                    "beatmap {beatmap_id} checksum mismatch or unknown"
                )));
            }
        }
        let item = self.find_mut(item_id).expect("checked above");
        item.beatmap_id = beatmap_id;
        item.beatmap_checksum = checksum.to_string();
        item.ruleset_id = ruleset_id;
        Ok(())
    }

    /// Marks the current item expired and advances the pointer to the next
    /// unexpired item per the queue-mode ordering rules.
    pub fn finish_current_item(&mut self, host: UserId, now: DateTime<Utc>) -> Option<PlaylistItemId> {
        let Some(current_id) = self.current_item_id else {
            return None;
        };
        let finishing_owner = self.find(current_id).map(|i| i.owner_user_id);
        if let Some(item) = self.find_mut(current_id) {
            item.expired = true;
            item.played_at = Some(now);
        }

        let next = match self.mode.0 {
            QueueMode::HostOnly => self
                .items
                .iter()
                .find(|i| !i.expired && i.owner_user_id == host)
                .map(|i| i.id),
            QueueMode::AllPlayers => self.items.iter().find(|i| !i.expired).map(|i| i.id),
            QueueMode::AllPlayersRoundRobin => {
                // Rotate: prefer the next unexpired item not authored by
                // whoever just finished, falling back to any remaining item.
                let rotated = self
                    .items
                    .iter()
                    .find(|i| !i.expired && Some(i.owner_user_id) != finishing_owner)
                    .map(|i| i.id);
                rotated.or_else(|| self.items.iter().find(|i| !i.expired).map(|i| i.id))
            }
        };
        self.current_item_id = next;
        next
    }
}
