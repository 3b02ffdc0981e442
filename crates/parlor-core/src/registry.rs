//! Connection registry.
//!
//! Maps live, ephemeral connection ids to their bound user and room.
//! Connections are plain string ids; the binding is a small value struct,
//! never a stateful object. The registry is process-local - it is not
//! written to the shared store.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::error::EngineError;

/// The user and room a connection was bound to by its set-nickname event.
///
/// Set once, immutable for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The authenticated username.
    pub username: String,
    /// The one room this connection belongs to.
    pub room_id: String,
}

/// Registry of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    bindings: DashMap<String, Binding>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check whether no connections are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bind a connection to a username and room.
    ///
    /// Returns `true` if the connection was newly bound, `false` if it was
    /// already bound to identical values (a no-op).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyBound`] if the connection is bound to
    /// a different username or room; the existing binding is untouched.
    pub fn bind(
        &self,
        conn_id: &str,
        username: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Result<bool, EngineError> {
        let binding = Binding {
            username: username.into(),
            room_id: room_id.into(),
        };

        match self.bindings.entry(conn_id.to_string()) {
            Entry::Occupied(existing) => {
                if *existing.get() == binding {
                    Ok(false)
                } else {
                    Err(EngineError::AlreadyBound(conn_id.to_string()))
                }
            }
            Entry::Vacant(slot) => {
                debug!(connection = %conn_id, username = %binding.username, room = %binding.room_id, "Connection bound");
                slot.insert(binding);
                Ok(true)
            }
        }
    }

    /// Resolve a connection to its binding.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnboundConnection`] if the connection never
    /// bound or was already unbound.
    pub fn resolve(&self, conn_id: &str) -> Result<Binding, EngineError> {
        self.bindings
            .get(conn_id)
            .map(|b| b.value().clone())
            .ok_or_else(|| EngineError::UnboundConnection(conn_id.to_string()))
    }

    /// Remove a connection's binding. Idempotent.
    ///
    /// Returns the binding that was removed, if any.
    pub fn unbind(&self, conn_id: &str) -> Option<Binding> {
        let removed = self.bindings.remove(conn_id).map(|(_, b)| b);
        if removed.is_some() {
            debug!(connection = %conn_id, "Connection unbound");
        }
        removed
    }
}
