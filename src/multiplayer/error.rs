//! Typed failures for the room engine, mapped onto the wire [`ErrorCode`]
//! taxonomy at the hub boundary instead of being thrown as exceptions.

use thiserror::Error;

use crate::protocol::ErrorCode;

use super::ids::{PlaylistItemId, RoomId, UserId};

/// Failures surfaced by room, playlist, and countdown operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room {0} is in a state that does not permit this operation")]
    InvalidState(String),

    #[error("clients may not directly request user state {0:?}")]
    InvalidStateChange(String),

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("user {0} not found in room {1}")]
    UserNotFound(UserId, RoomId),

    #[error("playlist item {0} not found in room {1}")]
    ItemNotFound(PlaylistItemId, RoomId),

    #[error("user {0} is not authorized to perform this operation")]
    NotAuthorized(UserId),

    #[error("the server is shutting down and is not accepting new joins")]
    ServerShuttingDown,

    #[error("database dependency unavailable: {0}")]
    DatabaseUnavailable(String),
}

impl RoomError {
    /// Maps this failure onto the wire error code taxonomy.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RoomError::InvalidState(_) => ErrorCode::MultiplayerInvalidState,
            RoomError::InvalidStateChange(_) => ErrorCode::MultiplayerInvalidStateChange,
            RoomError::RoomNotFound(_) | RoomError::UserNotFound(_, _) | RoomError::ItemNotFound(_, _) => {
                ErrorCode::MultiplayerNotFound
            }
            RoomError::NotAuthorized(_) => ErrorCode::MultiplayerNotAuthorized,
            RoomError::ServerShuttingDown => ErrorCode::MultiplayerServerShuttingDown,
            RoomError::DatabaseUnavailable(_) => ErrorCode::MultiplayerDatabaseUnavailable,
        }
    }
}

/// Failures specific to the countdown manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CountdownError {
    #[error("no countdown of the requested type is active in room {0}")]
    NotActive(RoomId),

    #[error("room {0} disappeared while the countdown was in flight")]
    RoomGone(RoomId),
}

/// Failures from the score upload pipeline, internal only -- never
/// surfaced to an RPC caller, always logged and the item dropped.
#[derive(Debug, Error, Clone)]
pub enum UploadError {
    #[error("score token {0} did not resolve before the upload timeout")]
    TimedOut(u64),

    #[error("storage backend rejected the write: {0}")]
    StorageUnavailable(String),
}
