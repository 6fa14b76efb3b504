//! TCP listener and accept loop.
//!
//! The loop accepts one socket at a time, spawns a [`Connection`] task for it,
//! and immediately waits for the next one, so a slow handshake never delays
//! other devices.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::infrastructure::connection::Connection;
use crate::infrastructure::server::{shutdown_signalled, ServerContext, ServerError};

/// Pause after a failed accept before trying again (e.g. out of file
/// descriptors), so the loop does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub struct Acceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Acceptor {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] with a hint about the likely cause.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr,
            hint: bind_hint(addr.port(), source.kind()),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr,
            hint: "could not read the bound address",
            source,
        })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until the shutdown signal is raised.  The listener
    /// is closed when this returns.
    pub async fn run(self, ctx: Arc<ServerContext>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_signalled(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {peer}");
                        let connection = Connection::new(peer, Arc::clone(&ctx));
                        tokio::spawn(connection.run(stream, shutdown.clone()));
                    }
                    Err(e) => {
                        if ctx.is_stopping() {
                            debug!("accept failed during shutdown: {e}");
                            break;
                        }
                        error!("accept error: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
        info!("stopped accepting connections on {}", self.local_addr);
    }
}

fn bind_hint(port: u16, kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::AddrInUse => "the port is already in use by another process",
        ErrorKind::PermissionDenied if port < 1024 => {
            "ports below 1024 require elevated privileges"
        }
        ErrorKind::PermissionDenied => "permission denied by the operating system",
        ErrorKind::AddrNotAvailable => "the bind address is not assigned to this host",
        _ if port < 1024 => "ports below 1024 require elevated privileges",
        _ => "the port may already be in use",
    }
}
