//! Infrastructure layer for carehub-server.
//!
//! Everything that touches the network or owns a thread:
//!
//! - Binding the TCP listener and accepting sockets (`acceptor`)
//! - The WebSocket upgrade and per-connection read loop (`connection`)
//! - The close-request handle shared with sessions (`ws_channel`)
//! - The idle-eviction thread (`reaper`)
//! - Start/stop orchestration (`server`)

pub mod acceptor;
pub mod connection;
pub mod reaper;
pub mod server;
pub mod ws_channel;

pub use server::{HubServer, ServerContext, ServerError, ServerState};
