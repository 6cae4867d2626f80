//! Room registry: process-wide map from [`RoomId`] to room state, and
//! the single-writer exclusive lease ([`Usage`]) every operation takes
//! before touching a room.
//!
//! Mirrors the `DashMap`-backed connection registries elsewhere in this
//! server, but the value here is a `tokio::sync::Mutex` rather than a plain
//! entry: holding a [`Usage`] is how the rest of this module enforces that
//! at most one task mutates a given room's state at a time. `tokio::sync
//! ::Mutex` serves waiters in the order they queued, so a run of operations
//! against one busy room is handled fairly rather than starving late
//! arrivals.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::ids::RoomId;
use super::room::Room;

/// An exclusive, held lease on a single room's state.
///
/// Dropping a `Usage` releases the lock. It carries no awareness of
/// whether the room should be evicted from the registry -- callers that
/// may have emptied a room call [`RoomRegistry::evict_if_empty`] explicitly
/// before dropping their usage.
pub struct Usage {
    room_id: RoomId,
    guard: OwnedMutexGuard<Room>,
}

impl Usage {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }
}

impl Deref for Usage {
    type Target = Room;

    fn deref(&self) -> &Room {
        &self.guard
    }
}

impl DerefMut for Usage {
    fn deref_mut(&mut self) -> &mut Room {
        &mut self.guard
    }
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires exclusive use of an existing room. Returns `None` if the
    /// room is not known to this process (never created, already ended and
    /// evicted, or owned by a different instance entirely).
    pub async fn get_for_use(&self, room_id: RoomId) -> Option<Usage> {
        let cell = self.rooms.get(&room_id)?.clone();
        let guard = cell.lock_owned().await;
        Some(Usage { room_id, guard })
    }

    /// Acquires exclusive use of `room_id`, creating it via `factory` if it
    /// does not already exist. `factory` only runs on first creation.
    pub async fn get_or_create(&self, room_id: RoomId, factory: impl FnOnce() -> Room) -> Usage {
        let cell = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(factory())))
            .clone();
        let guard = cell.lock_owned().await;
        Usage { room_id, guard }
    }

    /// Removes `usage`'s room from the registry if it currently has no
    /// users, so a later `get_for_use` correctly reports it as gone. Safe
    /// to call while other tasks still hold a handle to the underlying
    /// `Arc` from an in-flight countdown continuation; they observe the
    /// eviction only on their own next `get_for_use`.
    pub fn evict_if_empty(&self, usage: &Usage) -> bool {
        if usage.users().is_empty() {
            self.rooms.remove(&usage.room_id);
            true
        } else {
            false
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplayer::room::RoomSettings;
    use std::time::Duration;

    fn settings() -> RoomSettings {
        RoomSettings {
            name: "test room".into(),
            auto_start_duration: Duration::from_secs(0),
            auto_skip_countdown: false,
        }
    }

    #[tokio::test]
    async fn get_for_use_returns_none_for_unknown_room() {
        let registry = RoomRegistry::new();
        assert!(registry.get_for_use(RoomId::new(1)).await.is_none());
    }

    #[tokio::test]
    async fn get_or_create_only_runs_factory_once() {
        let registry = RoomRegistry::new();
        let room_id = RoomId::new(1);
        let mut calls = 0;
        {
            let _usage = registry
                .get_or_create(room_id, || {
                    calls += 1;
                    Room::new(room_id, crate::multiplayer::ids::UserId::new(1), settings())
                })
                .await;
        }
        let _usage = registry
            .get_or_create(room_id, || {
                calls += 1;
                Room::new(room_id, crate::multiplayer::ids::UserId::new(1), settings())
            })
            .await;
        assert_eq!(calls, 1);
        assert_eq!(registry.room_count(), 1);
    }

    #[tokio::test]
    async fn evict_if_empty_removes_empty_room_only() {
        let registry = RoomRegistry::new();
        let room_id = RoomId::new(1);
        let host = crate::multiplayer::ids::UserId::new(7);
        let usage = registry
            .get_or_create(room_id, || Room::new(room_id, host, settings()))
            .await;
        assert!(!registry.evict_if_empty(&usage));
        drop(usage);
        assert!(registry.contains(room_id));
    }

    #[tokio::test]
    async fn concurrent_acquires_serialize_on_the_same_room() {
        let registry = Arc::new(RoomRegistry::new());
        let room_id = RoomId::new(1);
        let host = crate::multiplayer::ids::UserId::new(1);
        {
            registry
                .get_or_create(room_id, || Room::new(room_id, host, settings()))
                .await;
        }

        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for worker in 0..2u8 {
            let registry = registry.clone();
            let barrier = barrier.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                let _usage = registry.get_for_use(room_id).await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
                order.lock().await.push(worker);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(order.lock().await.len(), 2);
    }
}
