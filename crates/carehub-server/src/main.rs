//! Care hub session server entry point.
//!
//! Cameras and wearables connect over WebSocket, one connection per device.
//! This binary builds a [`ServerConfig`] from defaults, an optional TOML file
//! and the command line, starts the hub, and stops it gracefully on Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! carehub-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML configuration file
//!   --port <PORT>            Listener port [default: 3000]
//!   --bind <IP>              Listener address [default: 0.0.0.0]
//!   --session-timeout <SECS> Idle timeout in seconds [default: 5]
//!   --grace-period <SECS>    Minimum age before idle eviction [default: timeout]
//!   --reaper-period-ms <MS>  Reaper sweep period [default: 500]
//!   --max-sessions <N>       Advisory session cap [default: 5]
//!   --shutdown-timeout <SECS> Bound on graceful stop [default: 5]
//! ```
//!
//! # Precedence
//!
//! Command-line flags (or their `CAREHUB_*` environment variables) override
//! the config file, which overrides the built-in defaults.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use carehub_server::application::MonitorReceivers;
use carehub_server::domain::{ConfigFile, ServerConfig};
use carehub_server::HubServer;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Care hub WebSocket session server.
///
/// Every option is optional; unset options fall back to the config file and
/// then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "carehub-server",
    about = "WebSocket session hub for care-home cameras and wearables",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file is an error.
    #[arg(long, env = "CAREHUB_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port for the WebSocket listener.
    #[arg(long, env = "CAREHUB_PORT", value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// IPv4 address to bind.  `0.0.0.0` accepts devices on every interface.
    #[arg(long, env = "CAREHUB_BIND")]
    bind: Option<Ipv4Addr>,

    /// Seconds of silence after which a session is evicted.
    #[arg(long, env = "CAREHUB_SESSION_TIMEOUT")]
    session_timeout: Option<u64>,

    /// Seconds a new session is protected from idle eviction.
    #[arg(long, env = "CAREHUB_GRACE_PERIOD")]
    grace_period: Option<u64>,

    /// Milliseconds between reaper sweeps.
    #[arg(long, env = "CAREHUB_REAPER_PERIOD_MS")]
    reaper_period_ms: Option<u64>,

    /// Session count above which a warning is logged.
    #[arg(long, env = "CAREHUB_MAX_SESSIONS")]
    max_sessions: Option<usize>,

    /// Seconds `stop` waits for connections to drain.
    #[arg(long, env = "CAREHUB_SHUTDOWN_TIMEOUT")]
    shutdown_timeout: Option<u64>,
}

impl Cli {
    /// Merges defaults, the config file and the command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged configuration is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::default();

        if let Some(path) = &self.config {
            let file = ConfigFile::load(path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            file.apply_to(&mut config);
        }

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_ip = bind;
        }
        if let Some(secs) = self.session_timeout {
            config.session_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.grace_period {
            config.grace_period = Some(Duration::from_secs(secs));
        }
        if let Some(ms) = self.reaper_period_ms {
            config.reaper_period = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_sessions {
            config.max_sessions = max;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.shutdown_timeout = Duration::from_secs(secs);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Drains the monitoring queues until the hub drops its senders.
///
/// No external monitor ships with the hub, so records are only logged.
async fn drain_monitor(mut receivers: MonitorReceivers) {
    let mut camera_open = true;
    let mut wearable_open = true;
    while camera_open || wearable_open {
        tokio::select! {
            record = receivers.camera.recv(), if camera_open => match record {
                Some(record) => {
                    debug!("camera update from {}: {:?}", record.peer, record.data.posture);
                }
                None => camera_open = false,
            },
            record = receivers.wearable.recv(), if wearable_open => match record {
                Some(record) => debug!("wearable update from {}: {:?}", record.peer, record.data),
                None => wearable_open = false,
            },
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Runs on a single-threaded runtime: the hub's work is socket-bound and the
/// reaper already has its own OS thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;
    info!(
        "care hub starting: bind={}, timeout={:?}, grace={:?}, max_sessions={}",
        config.bind_addr(),
        config.session_timeout,
        config.grace_period(),
        config.max_sessions
    );

    let (mut server, receivers) = HubServer::new(config)?;
    server.start().await.context("starting the care hub")?;
    tokio::spawn(drain_monitor(receivers));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => error!("failed to listen for Ctrl+C: {e}; shutting down"),
    }

    server.stop().await;
    info!("care hub stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_cli_without_arguments_leaves_everything_unset() {
        let cli = Cli::parse_from(["carehub-server"]);
        assert!(cli.port.is_none());
        assert!(cli.config.is_none());
        assert!(cli.session_timeout.is_none());
    }

    #[test]
    fn test_into_server_config_defaults() {
        // Arrange
        let cli = Cli::parse_from(["carehub-server"]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["carehub-server", "--port", "9001"]);
        let config = cli.into_server_config().unwrap();
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn test_cli_rejects_port_zero() {
        let result = Cli::try_parse_from(["carehub-server", "--port", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_bind_address() {
        let result = Cli::try_parse_from(["carehub-server", "--bind", "not.an.ip"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_timing_overrides() {
        // Arrange
        let cli = Cli::parse_from([
            "carehub-server",
            "--session-timeout",
            "30",
            "--grace-period",
            "60",
            "--reaper-period-ms",
            "250",
            "--shutdown-timeout",
            "2",
        ]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.session_timeout, Duration::from_secs(30));
        assert_eq!(config.grace_period(), Duration::from_secs(60));
        assert_eq!(config.reaper_period, Duration::from_millis(250));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_session_timeout_is_rejected() {
        let cli = Cli::parse_from(["carehub-server", "--session-timeout", "0"]);
        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        // Arrange: file sets port and timeout; CLI overrides only the port
        let path = std::env::temp_dir().join(format!(
            "carehub-cli-{}.toml",
            uuid::Uuid::new_v4()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "port = 4000\nsession_timeout_secs = 12").unwrap();
        drop(file);

        let cli = Cli::parse_from([
            "carehub-server",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "4500",
        ]);

        // Act
        let config = cli.into_server_config();
        std::fs::remove_file(&path).unwrap();
        let config = config.unwrap();

        // Assert
        assert_eq!(config.port, 4500);
        assert_eq!(config.session_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from([
            "carehub-server",
            "--config",
            "/nonexistent/carehub.toml",
        ]);
        assert!(cli.into_server_config().is_err());
    }
}
