//! Server lifecycle.
//!
//! [`HubServer`] owns the acceptor task and the reaper thread and drives the
//! `Idle → Running → Stopping → Idle` state machine.
//!
//! # Shutdown order
//!
//! 1. Set the stop flag so accept/read errors caused by the shutdown itself
//!    are not reported as failures.
//! 2. Stop and join the reaper, so nothing else mutates the table.
//! 3. Broadcast the shutdown signal and await the accept loop; the listener
//!    is dropped, so new connections are refused from here on.
//! 4. Ask every open session to close (connections that never sent a frame
//!    have no session and react to the broadcast instead).
//! 5. Poll until no connection is alive or the shutdown bound elapses.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::camera::{FormatProbeAnalyzer, ImageAnalyzer};
use crate::application::dispatcher::Dispatcher;
use crate::application::eviction::EvictionPolicy;
use crate::application::monitor::{monitor_queues, MonitorReceivers, MonitorSink};
use crate::application::session_table::SessionTable;
use crate::domain::config::{ConfigError, ServerConfig};
use crate::infrastructure::acceptor::Acceptor;
use crate::infrastructure::reaper::{spawn_reaper, ReaperHandle, ReaperSettings};

/// Interval at which `stop()` re-checks the live connection count.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error type for server lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source} ({hint})")]
    Bind {
        addr: SocketAddr,
        hint: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// `start()` was called while the server was running.
    #[error("server is already running")]
    AlreadyRunning,

    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The reaper thread could not be spawned.
    #[error("failed to spawn reaper thread: {0}")]
    Reaper(#[source] std::io::Error),
}

/// Lifecycle state of a [`HubServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Running,
    Stopping,
}

/// State shared between the server, the accept loop and every connection.
pub struct ServerContext {
    pub table: SessionTable,
    pub dispatcher: Dispatcher,
    stopping: AtomicBool,
    live_connections: AtomicUsize,
}

impl ServerContext {
    pub fn new(table: SessionTable, dispatcher: Dispatcher) -> Self {
        Self {
            table,
            dispatcher,
            stopping: AtomicBool::new(false),
            live_connections: AtomicUsize::new(0),
        }
    }

    /// Whether a shutdown is in progress.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    fn set_stopping(&self, stopping: bool) {
        self.stopping.store(stopping, Ordering::Release);
    }

    /// Connections accepted and not yet dropped.
    pub fn live_connections(&self) -> usize {
        self.live_connections.load(Ordering::Acquire)
    }

    pub(crate) fn connection_opened(&self) {
        self.live_connections.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn connection_closed(&self) {
        self.live_connections.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Resolves once the shutdown signal is raised or its sender is gone.
pub(crate) async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    reaper: ReaperHandle,
}

/// The session hub.
///
/// # Example
///
/// ```no_run
/// use carehub_server::domain::ServerConfig;
/// use carehub_server::HubServer;
///
/// # async fn example() -> anyhow::Result<()> {
/// let (mut server, _monitor) = HubServer::new(ServerConfig::default())?;
/// let addr = server.start().await?;
/// println!("listening on {addr}");
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct HubServer {
    config: ServerConfig,
    ctx: Arc<ServerContext>,
    state: ServerState,
    running: Option<Running>,
}

impl HubServer {
    /// Creates an idle server with the default image analyzer.
    ///
    /// Returns the server and the consumer ends of its monitoring queues.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `config` fails validation.
    pub fn new(config: ServerConfig) -> Result<(Self, MonitorReceivers), ServerError> {
        Self::with_analyzer(config, Arc::new(FormatProbeAnalyzer))
    }

    /// Creates an idle server that hands camera frames to `analyzer`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if `config` fails validation.
    pub fn with_analyzer(
        config: ServerConfig,
        analyzer: Arc<dyn ImageAnalyzer>,
    ) -> Result<(Self, MonitorReceivers), ServerError> {
        config.validate()?;
        let (sink, receivers) = monitor_queues(config.monitor_queue_capacity);
        let dispatcher = Dispatcher::new(analyzer, sink, config.max_sessions);
        let ctx = Arc::new(ServerContext::new(SessionTable::new(), dispatcher));
        Ok((
            Self {
                config,
                ctx,
                state: ServerState::Idle,
                running: None,
            },
            receivers,
        ))
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The bound listener address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.ctx.table
    }

    pub fn monitor(&self) -> &MonitorSink {
        self.ctx.dispatcher.monitor()
    }

    pub fn live_connections(&self) -> usize {
        self.ctx.live_connections()
    }

    /// Binds the listener and starts the accept loop and the reaper.
    ///
    /// Returns the bound address (useful with port `0`).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] if the server is not idle,
    /// [`ServerError::Bind`] if the port cannot be bound, and
    /// [`ServerError::Reaper`] if the reaper thread cannot be spawned.  The
    /// server stays idle on every error.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.state != ServerState::Idle {
            warn!("start() called while the server is {:?}", self.state);
            return Err(ServerError::AlreadyRunning);
        }

        self.ctx.set_stopping(false);
        self.ctx.table.clear();

        let acceptor = Acceptor::bind(self.config.bind_addr()).await?;
        let local_addr = acceptor.local_addr();

        let reaper = spawn_reaper(
            self.ctx.table.clone(),
            ReaperSettings {
                policy: EvictionPolicy {
                    session_timeout: self.config.session_timeout,
                    grace_period: self.config.grace_period(),
                },
                period: self.config.reaper_period,
                status_log_interval: self.config.status_log_interval,
            },
        )
        .map_err(ServerError::Reaper)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(acceptor.run(Arc::clone(&self.ctx), shutdown_rx));

        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            accept_task,
            reaper,
        });
        self.state = ServerState::Running;
        info!("care hub listening on {local_addr}");
        Ok(local_addr)
    }

    /// Shuts the server down and waits, up to the configured bound, for every
    /// connection to finish.  A no-op (with a warning) when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            warn!("stop() called on a server that is not running");
            return;
        };
        self.state = ServerState::Stopping;
        info!("stopping care hub on {}", running.local_addr);

        self.ctx.set_stopping(true);

        let reaper = running.reaper;
        if let Err(e) = tokio::task::spawn_blocking(move || reaper.stop()).await {
            warn!("failed to join reaper thread: {e}");
        }

        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.accept_task.await {
            warn!("accept loop ended abnormally: {e}");
        }

        let mut requested = 0usize;
        self.ctx.table.for_each_snapshot(|session| {
            if session.is_open() && session.request_close() {
                requested += 1;
            }
        });
        debug!("requested close on {requested} open session(s)");

        let deadline = Instant::now() + self.config.shutdown_timeout;
        while self.ctx.live_connections() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "{} connection(s) still open after {:?}; giving up waiting",
                    self.ctx.live_connections(),
                    self.config.shutdown_timeout
                );
                break;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        let remaining = self.ctx.table.len();
        self.ctx.table.clear();
        drop(running.shutdown_tx);
        self.state = ServerState::Idle;
        info!("care hub stopped ({remaining} session(s) discarded)");
    }
}

impl Drop for HubServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            // Best effort, and never blocking: drop may run on a runtime
            // thread.  Connections and the accept loop observe the signal.
            self.ctx.set_stopping(true);
            let _ = running.shutdown_tx.send(true);
            running.reaper.detach();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
