//! The multiplayer room engine: the per-room state machine, its
//! dispatch surface, the spectator session tracker, the score
//! upload pipeline, and the metadata broadcaster.
//!
//! Everything here is independent of the wire framing and connection
//! directory in [`crate::websocket`] and [`crate::server`] -- this module
//! only knows rooms, users, playlists, countdowns, and the two external
//! ports ([`ports::ScoreDatabase`], [`ports::ScoreStorage`]) it consumes.

pub mod broadcaster;
pub mod countdown;
pub mod error;
pub mod hub;
pub mod ids;
pub mod match_type;
pub mod playlist;
pub mod ports;
pub mod registry;
pub mod room;
pub mod spectator;
pub mod upload;

pub use broadcaster::{BroadcastSink, MetadataBroadcaster};
pub use error::{CountdownError, RoomError, UploadError};
pub use hub::{HubResult, HubTransport, LoggingTransport, MultiplayerHub, RoomCreateOptions, RoomSnapshot};
pub use ids::{CountdownId, PlaylistItemId, RoomId, ScoreToken, UserId, MAX_LEGACY_RULESET_ID};
pub use ports::{
    BeatmapSetUpdates, InMemoryScoreDatabase, NullScoreStorage, PlaylistItemRecord, RoomRecord,
    ScoreDatabase, ScoreIdentity, ScoreStorage,
};
pub use spectator::SpectatorSessionTracker;
pub use registry::{RoomRegistry, Usage};
pub use room::{Room, RoomEvent, RoomSettings, RoomState, RoomUser, UserState};
pub use upload::{ApiUser, LocalScore, MergedScore, ScoreUploadPipeline, UploadPipelineSettings};
