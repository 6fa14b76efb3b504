//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for runtime settings and is
//! immutable once handed to [`HubServer`](crate::HubServer).  It is built from
//! defaults, then overlaid with an optional TOML file ([`ConfigFile`]), then
//! with CLI flags / environment variables in `main.rs`.
//!
//! # TOML file
//!
//! Every key is optional; absent keys keep the value from the layer below.
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 3000
//! max_sessions = 5
//! session_timeout_secs = 5
//! grace_period_secs = 5
//! reaper_period_ms = 500
//! status_log_interval_secs = 10
//! shutdown_timeout_secs = 5
//! monitor_queue_capacity = 64
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// All runtime configuration for the hub.
///
/// # Example
///
/// ```rust
/// use carehub_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr().port(), 3000);
/// assert_eq!(cfg.grace_period(), cfg.session_timeout);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// IPv4 address the listener binds to.
    pub bind_ip: Ipv4Addr,

    /// Listener port.  `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Advisory cap on concurrent sessions.  Exceeding it logs a warning; no
    /// device is ever refused.
    pub max_sessions: usize,

    /// A session silent for longer than this is evicted.
    pub session_timeout: Duration,

    /// Minimum session age before idle eviction applies.  `None` means "same
    /// as `session_timeout`".
    pub grace_period: Option<Duration>,

    /// How often the reaper sweeps the session table.
    pub reaper_period: Duration,

    /// How often the reaper logs the session count.
    pub status_log_interval: Duration,

    /// Upper bound on how long `stop()` waits for connections to drain.
    pub shutdown_timeout: Duration,

    /// Capacity of each monitoring queue.
    pub monitor_queue_capacity: usize,
}

impl Default for ServerConfig {
    /// | Field                  | Default      |
    /// |------------------------|--------------|
    /// | bind_ip                | `0.0.0.0`    |
    /// | port                   | 3000         |
    /// | max_sessions           | 5            |
    /// | session_timeout        | 5 seconds    |
    /// | grace_period           | = timeout    |
    /// | reaper_period          | 500 ms       |
    /// | status_log_interval    | 10 seconds   |
    /// | shutdown_timeout       | 5 seconds    |
    /// | monitor_queue_capacity | 64           |
    fn default() -> Self {
        Self {
            bind_ip: Ipv4Addr::UNSPECIFIED,
            port: 3000,
            max_sessions: 5,
            session_timeout: Duration::from_secs(5),
            grace_period: None,
            reaper_period: Duration::from_millis(500),
            status_log_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            monitor_queue_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.bind_ip, self.port))
    }

    /// Effective eviction grace period.
    pub fn grace_period(&self) -> Duration {
        self.grace_period.unwrap_or(self.session_timeout)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero timeout, reaper period,
    /// status interval, session cap, or queue capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "session timeout must be greater than zero".to_string(),
            ));
        }
        if self.reaper_period.is_zero() {
            return Err(ConfigError::Invalid(
                "reaper period must be greater than zero".to_string(),
            ));
        }
        if self.status_log_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "status log interval must be greater than zero".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        if self.monitor_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "monitor queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ── TOML file layer ───────────────────────────────────────────────────────────

/// On-disk configuration; every field overrides the matching
/// [`ServerConfig`] value when present.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub bind: Option<Ipv4Addr>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub max_sessions: Option<usize>,
    #[serde(default)]
    pub session_timeout_secs: Option<u64>,
    #[serde(default)]
    pub grace_period_secs: Option<u64>,
    #[serde(default)]
    pub reaper_period_ms: Option<u64>,
    #[serde(default)]
    pub status_log_interval_secs: Option<u64>,
    #[serde(default)]
    pub shutdown_timeout_secs: Option<u64>,
    #[serde(default)]
    pub monitor_queue_capacity: Option<usize>,
}

impl ConfigFile {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read (including when
    /// it does not exist) and [`ConfigError::Parse`] if the TOML is malformed
    /// or contains unknown keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overlays the values present in this file onto `config`.
    pub fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.bind_ip = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max) = self.max_sessions {
            config.max_sessions = max;
        }
        if let Some(secs) = self.session_timeout_secs {
            config.session_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.grace_period_secs {
            config.grace_period = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = self.reaper_period_ms {
            config.reaper_period = Duration::from_millis(ms);
        }
        if let Some(secs) = self.status_log_interval_secs {
            config.status_log_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            config.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = self.monitor_queue_capacity {
            config.monitor_queue_capacity = capacity;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
