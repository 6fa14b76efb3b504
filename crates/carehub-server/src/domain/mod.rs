//! Domain layer for carehub-server.
//!
//! Plain types with no sockets and no async: the server configuration and the
//! session entity shared between connection tasks and the reaper thread.

pub mod config;
pub mod session;

pub use config::{ConfigError, ConfigFile, ServerConfig};
pub use session::{Session, SessionChannel, SessionSnapshot, SessionState};
