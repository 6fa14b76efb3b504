//! carehub-server library crate.
//!
//! A single-process WebSocket hub that cameras and wearables in a care home
//! connect to.  Each device keeps one persistent connection; the hub keys its
//! session by the peer IP address, classifies the device from its first text
//! frame, and routes every later frame to the matching handler.
//!
//! # Architecture
//!
//! ```text
//! Devices (WebSocket, one connection per IP)
//!         ↕
//! [carehub-server]
//!   ├── domain/           ServerConfig, Session entity, SessionChannel seam
//!   ├── application/      SessionTable, Dispatcher, handlers, monitor queues,
//!   │                     eviction sweep
//!   └── infrastructure/
//!         ├── acceptor/   TCP listener + accept loop
//!         ├── connection/ per-socket state machine (upgrade, read loop)
//!         ├── reaper/     idle-eviction thread
//!         └── server/     HubServer start/stop lifecycle
//! ```
//!
//! # Layer rules
//!
//! - `domain` performs no I/O.
//! - `application` depends on `domain` and `carehub-core`; it never touches a
//!   socket, so the whole dispatch path is unit-testable with fake channels.
//! - `infrastructure` owns tokio, tungstenite and the reaper thread.

pub mod domain;

pub mod application;

pub mod infrastructure;

pub use infrastructure::server::{HubServer, ServerError, ServerState};
