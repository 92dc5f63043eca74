// ============================
// crates/identity-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Layering, lowest precedence first: built-in defaults, a TOML file, then
//! `IDENTITY_`-prefixed environment variables. Nested keys use `__`, so
//! `IDENTITY_JWT__SECRET` sets `jwt.secret`.
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Config file read when no explicit path is given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "identity.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "IDENTITY_";

/// Signing secret used when none is configured. Only fit for local development.
pub const DEV_JWT_SECRET: &str = "campus-identity-dev-secret";

/// Longest accepted per-request timeout (one hour)
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 60 * 60;

/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level, overridden by `RUST_LOG` when set
    pub log_level: String,
    pub log_format: LogFormat,
    /// Upper bound on the time spent serving one request
    pub request_timeout_secs: u64,
    pub jwt: JwtSettings,
    pub storage: StorageSettings,
    pub session_cache: SessionCacheSettings,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Token signing settings
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    /// Token lifetime in hours
    pub duration_hours: u64,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("duration_hours", &self.duration_hours)
            .finish()
    }
}

/// Which credential store to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root directory of the flat-file store
    pub path: PathBuf,
}

/// Session cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCacheSettings {
    pub enabled: bool,
    /// Reject tokens that have no live cache entry
    pub enforce_liveness: bool,
    /// Seconds between sweeps of expired entries
    pub cleanup_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            request_timeout_secs: 10,
            jwt: JwtSettings::default(),
            storage: StorageSettings::default(),
            session_cache: SessionCacheSettings::default(),
        }
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
            duration_hours: 24,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("data"),
        }
    }
}

impl Default for SessionCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            enforce_liveness: false,
            cleanup_interval_secs: 60,
        }
    }
}

impl Settings {
    /// Load from `identity.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None::<&Path>)
    }

    /// Load with an explicit config file, which must exist when given
    pub fn load_from<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let path = path.as_ref();
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                path.to_path_buf()
            },
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Create a new settings builder
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "invalid log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        if self.jwt.secret.trim().is_empty() {
            return Err(AppError::Config("jwt.secret must not be empty".to_string()));
        }
        if self.jwt.duration_hours == 0 || self.jwt.duration_hours > MAX_TOKEN_TTL_HOURS {
            return Err(AppError::Config(format!(
                "jwt.duration_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}"
            )));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(AppError::Config(format!(
                "request_timeout_secs must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}"
            )));
        }
        if self.session_cache.enabled && self.session_cache.cleanup_interval_secs == 0 {
            return Err(AppError::Config(
                "session_cache.cleanup_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.as_os_str().is_empty() {
            return Err(AppError::Config(
                "storage.path is required for the file backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt.duration_hours.saturating_mul(60 * 60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session_cache.cleanup_interval_secs)
    }

    /// Whether the signing secret is still the built-in development value
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt.secret == DEV_JWT_SECRET
    }
}

/// Builder for [`Settings`], starting from the defaults
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.settings.bind_addr = addr;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.settings.log_level = level.into();
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.settings.log_format = format;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.request_timeout_secs = secs;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.settings.jwt.secret = secret.into();
        self
    }

    pub fn token_ttl_hours(mut self, hours: u64) -> Self {
        self.settings.jwt.duration_hours = hours;
        self
    }

    pub fn storage(mut self, backend: StorageBackend, path: impl Into<PathBuf>) -> Self {
        self.settings.storage = StorageSettings {
            backend,
            path: path.into(),
        };
        self
    }

    pub fn session_cache(mut self, enabled: bool, enforce_liveness: bool) -> Self {
        self.settings.session_cache.enabled = enabled;
        self.settings.session_cache.enforce_liveness = enforce_liveness;
        self
    }

    pub fn cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.settings.session_cache.cleanup_interval_secs = secs;
        self
    }

    /// Validate and return the settings
    pub fn build(self) -> Result<Settings, AppError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
