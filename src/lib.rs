#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Signal Fish Server
//!
//! A lightweight, in-memory WebSocket signaling server for peer-to-peer game networking.
//!
//! Ships with an in-memory backend for every external dependency (database,
//! score/beatmap lookups, blob storage) -- run the binary and it serves
//! WebSocket connections and the multiplayer room engine's RPCs with no
//! external services to stand up first. Production deployments swap the
//! in-memory defaults behind the same trait seams.

/// Authentication middleware (in-memory backed)
pub mod auth;

/// Optimized broadcast message handling
pub mod broadcast;

/// Server configuration and environment variables
pub mod config;

/// Room and player coordination logic
pub mod coordination;

/// Database abstraction layer (in-memory implementation)
pub mod database;

/// Distributed locking (in-memory implementation)
pub mod distributed;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// The multiplayer room engine: room state machine, playlist queue,
/// countdowns, score upload pipeline, and metadata broadcaster
pub mod multiplayer;

/// WebSocket message protocol definitions
pub mod protocol;

/// Rate limiting implementation
pub mod rate_limit;

/// Reconnection token and state management
pub mod reconnection;

/// Retry logic utilities
pub mod retry;

/// Zero-copy serialization utilities
pub mod rkyv_utils;

/// TLS and crypto utilities
pub mod security;

/// Main server orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
