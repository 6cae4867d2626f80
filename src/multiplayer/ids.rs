//! Identifier newtypes for the multiplayer room engine.
//!
//! Kept distinct from the transport-level [`crate::protocol::PlayerId`]
//! (a connection-scoped `Uuid`): a `UserId` here is the durable, database
//! backed identity a connection authenticates as, while `PlayerId` identifies
//! the live WebSocket session. The hub is the seam that maps one to the
//! other.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! u64_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

u64_id!(RoomId);
u64_id!(UserId);
u64_id!(PlaylistItemId);
u64_id!(CountdownId);
u64_id!(ScoreToken);

/// Largest ruleset id recognized by the legacy (non-custom) ruleset set.
pub const MAX_LEGACY_RULESET_ID: i32 = 3;
