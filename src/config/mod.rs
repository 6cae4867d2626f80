//! Configuration module for Signal Fish.
//!
//! This module provides comprehensive configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Server behavior configuration (rooms, players, timeouts)
//! - [`protocol`]: Protocol settings (SDK compatibility, player names)
//! - [`security`]: Security and authentication settings
//! - [`crate::config::relay`]: Relay type configuration
//! - [`logging`]: Logging configuration
//! - [`coordination`]: Cross-instance coordination settings
//! - [`metrics`]: Metrics configuration
//! - [`websocket`]: WebSocket connection settings
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod coordination;
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod multiplayer;
pub mod protocol;
pub mod relay;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;
pub mod websocket;

// Re-exports for convenience
pub use coordination::{CoordinationConfig, DedupCacheConfig};

pub use defaults::DashboardHistoryField;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use metrics::MetricsConfig;

pub use multiplayer::MultiplayerConfig;

pub use protocol::{
    PlayerNameValidationConfig, ProtocolConfig, SdkCompatibilityConfig, SdkCompatibilityError,
    SdkCompatibilityReport,
};

pub use relay::RelayTypeConfig;

pub use security::{
    AppAuthEntry, AuthMaintenanceConfig, ClientAuthMode, SecurityConfig, TlsServerConfig,
    TokenBindingConfig, TransportSecurityConfig,
};

pub use server::{RateLimitConfig, ServerConfig};

pub use types::Config;

pub use validation::{is_production_mode, validate_config_security};

pub use websocket::WebSocketConfig;
