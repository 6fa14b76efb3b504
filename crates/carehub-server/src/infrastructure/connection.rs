//! Per-socket connection state machine.
//!
//! ```text
//! Accepted ──► Upgrading ──► Reading ⟲ ──► Closed
//!                  │                         ▲
//!                  └─────────────────────────┘  (handshake failed)
//! ```
//!
//! A [`Connection`] is owned by its tokio task.  Dropping it marks the
//! channel closed (which records the session's disconnect time) and
//! decrements the server's live-connection count, however the task ends.
//!
//! The read path never removes a session from the table; the reaper does
//! that once it sees the closed channel.

use std::fmt;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use carehub_core::Frame;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::session::SessionChannel;
use crate::infrastructure::server::{shutdown_signalled, ServerContext};
use crate::infrastructure::ws_channel::WsChannel;

/// How long to wait for the peer's reply after sending a Close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle state of one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Upgrading,
    Reading,
    Closed,
}

impl ConnectionState {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (Self::Accepted, Self::Upgrading)
                | (Self::Upgrading, Self::Reading)
                | (Self::Upgrading, Self::Closed)
                | (Self::Reading, Self::Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::Upgrading => "upgrading",
            Self::Reading => "reading",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the read loop ended.
enum ReadEnd {
    /// The peer closed or the transport failed; nothing left to send.
    Peer,
    /// A close was requested locally; send a Close frame.
    Requested(&'static str),
}

pub struct Connection {
    id: Uuid,
    peer: SocketAddr,
    /// Session key: the peer IP without the port.
    key: String,
    state: ConnectionState,
    ctx: Arc<ServerContext>,
    channel: Arc<WsChannel>,
}

impl Connection {
    pub fn new(peer: SocketAddr, ctx: Arc<ServerContext>) -> Self {
        ctx.connection_opened();
        Self {
            id: Uuid::new_v4(),
            peer,
            key: peer.ip().to_string(),
            state: ConnectionState::Accepted,
            ctx,
            channel: Arc::new(WsChannel::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Applies a state transition.  Illegal transitions are refused and
    /// logged.
    fn transition(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                "connection {} ({}): illegal transition {} -> {}",
                self.id, self.peer, self.state, next
            );
            return false;
        }
        debug!("connection {} ({}): {} -> {}", self.id, self.peer, self.state, next);
        self.state = next;
        true
    }

    /// Drives the connection to completion: WebSocket upgrade, then the read
    /// loop, until the peer leaves, a close is requested, or the server shuts
    /// down.
    pub async fn run(mut self, stream: TcpStream, mut shutdown: watch::Receiver<bool>) {
        self.transition(ConnectionState::Upgrading);

        let upgraded = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => None,
            result = accept_async(stream) => match result {
                Ok(ws) => Some(ws),
                Err(e) => {
                    if self.ctx.is_stopping() {
                        debug!("handshake with {} aborted during shutdown: {e}", self.peer);
                    } else {
                        warn!("WebSocket handshake with {} failed: {e}", self.peer);
                    }
                    None
                }
            },
        };
        let Some(mut ws) = upgraded else {
            self.transition(ConnectionState::Closed);
            return;
        };

        self.transition(ConnectionState::Reading);
        info!("device connected from {} (connection {})", self.peer, self.id);

        match self.read_loop(&mut ws, &mut shutdown).await {
            ReadEnd::Peer => {}
            ReadEnd::Requested(reason) => self.close(&mut ws, reason).await,
        }

        self.transition(ConnectionState::Closed);
        info!("device {} disconnected (connection {})", self.peer, self.id);
    }

    async fn read_loop(
        &self,
        ws: &mut WebSocketStream<TcpStream>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReadEnd {
        let channel: Arc<dyn SessionChannel> = self.channel.clone();

        loop {
            tokio::select! {
                biased;
                _ = self.channel.close_requested() => {
                    debug!("close requested for {} (connection {})", self.peer, self.id);
                    return ReadEnd::Requested("session closed by server");
                }
                _ = shutdown_signalled(shutdown) => {
                    return ReadEnd::Requested("server shutting down");
                }
                message = ws.next() => match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        self.dispatch(&channel, Frame::Text(text));
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        self.dispatch(&channel, Frame::Binary(bytes));
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!("{} sent Close: {frame:?}", self.peer);
                        // tungstenite queues the reply; keep polling until
                        // the stream ends so it gets flushed.
                    }
                    // Ping/Pong are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.log_read_error(&e);
                        return ReadEnd::Peer;
                    }
                    None => return ReadEnd::Peer,
                },
            }
        }
    }

    fn dispatch(&self, channel: &Arc<dyn SessionChannel>, frame: Frame) {
        self.ctx
            .dispatcher
            .dispatch(&self.ctx.table, &self.key, self.id, channel, &frame);
    }

    /// Sends a normal-closure Close frame and waits briefly for the reply.
    async fn close(&self, ws: &mut WebSocketStream<TcpStream>, reason: &'static str) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.into(),
        };
        if let Err(e) = ws.close(Some(frame)).await {
            debug!("close handshake with {} failed: {e}", self.peer);
            return;
        }
        let drained = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;
        if drained.is_err() {
            debug!("{} did not answer the Close frame in time", self.peer);
        }
    }

    fn log_read_error(&self, e: &WsError) {
        if self.ctx.is_stopping() {
            debug!("read from {} ended during shutdown: {e}", self.peer);
            return;
        }
        let ordinary = match e {
            WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Protocol(_) => true,
            WsError::Io(io) => matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        };
        if ordinary {
            info!("{} dropped the connection: {e}", self.peer);
        } else {
            error!("read from {} failed: {e}", self.peer);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(
                "connection {} ({}) dropped in state {}",
                self.id, self.peer, self.state
            );
        }
        self.channel.mark_closed();
        self.ctx.connection_closed();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_legal_transitions() {
        assert!(Accepted.can_transition_to(Upgrading));
        assert!(Upgrading.can_transition_to(Reading));
        assert!(Upgrading.can_transition_to(Closed));
        assert!(Reading.can_transition_to(Closed));
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        // Arrange: every pair not in the legal set
        let all = [Accepted, Upgrading, Reading, Closed];
        let legal = [
            (Accepted, Upgrading),
            (Upgrading, Reading),
            (Upgrading, Closed),
            (Reading, Closed),
        ];

        // Act / Assert
        for from in all {
            for to in all {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {}",
                    if expected { "legal" } else { "illegal" }
                );
            }
        }
    }

    #[test]
    fn test_closed_is_terminal() {
        for next in [Accepted, Upgrading, Reading, Closed] {
            assert!(!Closed.can_transition_to(next));
        }
    }
}
