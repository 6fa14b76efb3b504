//! Concurrent session table keyed by peer IP.
//!
//! Backed by a [`DashMap`], so lookups and inserts for different peers never
//! contend on one global lock.  Check-then-act sequences for one key run
//! under that key's shard lock via the entry API.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::session::{Session, SessionChannel, SessionSnapshot, SessionState};

/// Result of [`SessionTable::lookup_or_create`].
#[derive(Debug)]
pub struct Lookup {
    /// The session now stored under the key.
    pub session: Arc<Session>,
    /// `true` if `session` was created by this call.
    pub created: bool,
    /// The session that a new connection from the same peer replaced.  Its
    /// close has already been requested.
    pub displaced: Option<Arc<Session>>,
    /// Whether that close request reached a still-open channel.
    pub displaced_close_requested: bool,
}

/// Shared handle to the session table.  Clones refer to the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    sessions: Arc<DashMap<String, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `key` if it belongs to `connection_id`;
    /// otherwise stores a new session built by `create`.
    ///
    /// An entry owned by a different connection is replaced, never
    /// duplicated, and returned in [`Lookup::displaced`] with its close
    /// already requested.  The whole operation holds the key's shard lock, so
    /// two concurrent calls for the same key cannot both create, and a
    /// displaced connection is retired before any other call sees the new
    /// entry.
    ///
    /// Returns `None` without touching the table when `caller` (the channel
    /// of `connection_id`) has been asked to close: a retired connection
    /// never takes the key back from its successor.
    ///
    /// `create` runs under that lock and must not access the table.
    pub fn lookup_or_create(
        &self,
        key: &str,
        connection_id: Uuid,
        caller: &dyn SessionChannel,
        create: impl FnOnce() -> Session,
    ) -> Option<Lookup> {
        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().connection_id() == connection_id {
                    return Some(Lookup {
                        session: Arc::clone(entry.get()),
                        created: false,
                        displaced: None,
                        displaced_close_requested: false,
                    });
                }
                if caller.is_close_requested() {
                    return None;
                }
                let session = Arc::new(create());
                let previous = entry.insert(Arc::clone(&session));
                let displaced_close_requested = previous.request_close();
                Some(Lookup {
                    session,
                    created: true,
                    displaced: Some(previous),
                    displaced_close_requested,
                })
            }
            Entry::Vacant(entry) => {
                if caller.is_close_requested() {
                    return None;
                }
                let session = Arc::new(create());
                entry.insert(Arc::clone(&session));
                Some(Lookup {
                    session,
                    created: true,
                    displaced: None,
                    displaced_close_requested: false,
                })
            }
        }
    }

    /// Applies `f` to the state of the session under `key`, holding that
    /// session's lock.  Returns `None` if there is no such session.
    pub fn visit<R>(&self, key: &str, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let session = self.get(key)?;
        Some(session.with_state(f))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Removes `key` only if it still belongs to `connection_id`.
    ///
    /// Returns `true` if an entry was removed.  A session that was replaced
    /// by a reconnect in the meantime is left alone.
    pub fn remove_if_connection(&self, key: &str, connection_id: Uuid) -> bool {
        self.sessions
            .remove_if(key, |_, session| session.connection_id() == connection_id)
            .is_some()
    }

    /// Handles to every session at the time of the call.
    pub fn handles(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Calls `f` for each session in a snapshot of the table.  No table lock
    /// is held while `f` runs, so `f` may insert or remove entries.
    pub fn for_each_snapshot(&self, mut f: impl FnMut(&Arc<Session>)) {
        for session in self.handles() {
            f(&session);
        }
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.handles().iter().map(|s| s.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }

    /// Number of live clones of this table handle.
    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.sessions)
    }

    /// Number of sessions whose channel is still open.
    pub fn open_channel_count(&self) -> usize {
        self.handles().iter().filter(|s| s.is_open()).count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
