//! In-memory authentication middleware for signal-fish-server.
//!
//! Validates application credentials against a static configuration loaded at
//! startup. When auth is disabled the middleware returns a default `AppInfo` for
//! every request.

use super::error::AuthError;
use super::rate_limiter::InMemoryRateLimiter;
use crate::config::AppAuthEntry;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Per-application rate limit information returned to clients.
///
/// Only `per_minute` is actively enforced server-side by the
/// `InMemoryRateLimiter`. The `per_hour` and `per_day` fields are advisory
/// projections (computed as multiples of `per_minute`) communicated to clients
/// so they can implement their own budgeting; they are not enforced by the
/// server.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Requests allowed per minute. This is the only limit actively enforced
    /// by the server-side rate limiter.
    pub per_minute: u32,
    /// Advisory projection: `per_minute * 60`. Communicated to clients for
    /// budgeting purposes but not enforced server-side.
    pub per_hour: u32,
    /// Advisory projection: `per_minute * 1440`. Communicated to clients for
    /// budgeting purposes but not enforced server-side.
    pub per_day: u32,
}

/// Application information returned after successful authentication.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub id: Uuid,
    pub name: String,
    pub organization: Option<String>,
    pub max_rooms: Option<u32>,
    pub max_players_per_room: Option<u8>,
    pub rate_limit_per_minute: Option<u32>,
    pub rate_limits: RateLimits,
}

/// Default rate limits applied when auth is disabled or an application has no
/// explicit per-minute limit configured.
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 1000;
const DEFAULT_RATE_LIMIT_PER_HOUR: u32 = 10000;
const DEFAULT_RATE_LIMIT_PER_DAY: u32 = 100_000;

/// Derive a deterministic UUID from a string key using SHA-256. The first 16
/// bytes of the hash are used as the UUID value with the version nibble set
/// to 4 (random) and the variant to RFC 4122.
fn deterministic_uuid(key: &str) -> Uuid {
    let hash = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    // Set version to 4 (bits 48..51)
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    // Set variant to RFC 4122 (bits 64..65)
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    Uuid::from_bytes(bytes)
}

/// Constant-time secret comparison to prevent timing attacks.
fn secrets_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// In-memory authentication middleware backed by a `HashMap` of configured
/// application entries.
pub struct AuthMiddleware {
    /// Map of app_id -> (app_secret, AppInfo). Empty when auth is disabled.
    apps: HashMap<String, (String, AppInfo)>,
    /// Per-app sliding-window rate limiter.
    rate_limiter: Arc<InMemoryRateLimiter>,
    /// Whether authentication is enabled.
    auth_enabled: bool,
}

impl AuthMiddleware {
    /// Create an auth middleware populated from a list of config entries.
    ///
    /// A background rate-limiter cleanup task is started only when at least one
    /// configured application has a `rate_limit_per_minute` set.
    pub fn new(entries: Vec<AppAuthEntry>) -> Self {
        let has_rate_limited_app = entries.iter().any(|e| e.rate_limit_per_minute.is_some());

        let mut apps = HashMap::with_capacity(entries.len());
        for entry in entries {
            let per_minute = entry
                .rate_limit_per_minute
                .unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE);
            let info = AppInfo {
                // Deterministic UUID derived from the app_id string so that
                // the same config always produces the same UUID.
                id: deterministic_uuid(&entry.app_id),
                name: entry.app_name.clone(),
                organization: None,
                max_rooms: entry.max_rooms,
                max_players_per_room: entry.max_players_per_room,
                rate_limit_per_minute: entry.rate_limit_per_minute,
                rate_limits: RateLimits {
                    per_minute,
                    per_hour: per_minute.saturating_mul(60),
                    per_day: per_minute.saturating_mul(60).saturating_mul(24),
                },
            };
            apps.insert(entry.app_id, (entry.app_secret, info));
        }

        let rate_limiter = Arc::new(InMemoryRateLimiter::new(Duration::from_secs(60)));

        if has_rate_limited_app {
            let _cleanup_handle = rate_limiter.clone().start_cleanup_task();
        }

        Self {
            apps,
            rate_limiter,
            auth_enabled: true,
        }
    }

    /// Create a disabled auth middleware that accepts all connections with
    /// default `AppInfo` values.
    pub fn disabled() -> Self {
        Self {
            apps: HashMap::new(),
            rate_limiter: Arc::new(InMemoryRateLimiter::new(Duration::from_secs(60))),
            auth_enabled: false,
        }
    }

    /// Validate both app_id and app_secret. Returns `AppInfo` on success.
    ///
    /// This method is `async` for interface compatibility so that future
    /// implementations (e.g., database-backed auth) can perform I/O without
    /// changing the call-site.
    pub async fn validate_app_credentials(
        &self,
        app_id: &str,
        app_secret: &str,
    ) -> Result<AppInfo, AuthError> {
        if !self.auth_enabled {
            return Ok(self.default_app_info(app_id));
        }

        let (expected_secret, info) = self.apps.get(app_id).ok_or(AuthError::InvalidAppId)?;

        if !secrets_match(expected_secret, app_secret) {
            return Err(AuthError::InvalidCredentials);
        }

        // Enforce per-app rate limit if configured.
        if let Some(limit) = info.rate_limit_per_minute {
            self.rate_limiter.check_rate_limit(app_id, limit)?;
        }

        Ok(info.clone())
    }

    /// Validate app_id only (no secret required). This is the method called
    /// by `websocket/connection.rs` during the `Authenticate` handshake.
    ///
    /// This method is `async` for interface compatibility so that future
    /// implementations (e.g., database-backed auth) can perform I/O without
    /// changing the call-site.
    pub async fn validate_app_id(&self, app_id: &str) -> Result<AppInfo, AuthError> {
        if !self.auth_enabled {
            return Ok(self.default_app_info(app_id));
        }

        let (_secret, info) = self.apps.get(app_id).ok_or(AuthError::InvalidAppId)?;

        // Enforce per-app rate limit if configured.
        if let Some(limit) = info.rate_limit_per_minute {
            self.rate_limiter.check_rate_limit(app_id, limit)?;
        }

        Ok(info.clone())
    }

    /// Build a default `AppInfo` for use when auth is disabled.
    fn default_app_info(&self, app_id: &str) -> AppInfo {
        let id = app_id
            .parse::<Uuid>()
            .unwrap_or_else(|_| deterministic_uuid(app_id));
        AppInfo {
            id,
            name: "default".to_string(),
            organization: None,
            max_rooms: None,
            max_players_per_room: None,
            rate_limit_per_minute: None,
            rate_limits: RateLimits {
                per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
                per_hour: DEFAULT_RATE_LIMIT_PER_HOUR,
                per_day: DEFAULT_RATE_LIMIT_PER_DAY,
            },
        }
    }
}
