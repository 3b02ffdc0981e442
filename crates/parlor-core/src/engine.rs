//! Engine facade.
//!
//! One entry point per inbound event, wiring the connection registry, the
//! presence coordinator, and the broadcast router in the order the control
//! flow demands: resolve the connection, apply the store transition, fan
//! out. Each inbound event is handled by its own task; no global lock is
//! taken anywhere on this path.
//!
//! Registry and delivery-group state is process-local and infallible, so
//! it is committed only around successful store transitions: a fresh bind
//! rolls back when the Join fails, and a disconnect unbinds only after the
//! Leave succeeds. Either way a failed event can be retried verbatim.

use std::sync::Arc;

use parlor_store::StateStore;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::EngineError;
use crate::event::Event;
use crate::presence::PresenceCoordinator;
use crate::registry::ConnectionRegistry;
use crate::router::BroadcastRouter;

/// Result of a fresh bind.
pub struct BindOutcome {
    /// Receiver for the room's events.
    pub receiver: broadcast::Receiver<Arc<Event>>,
    /// Whether this bind made the user newly present (`UserJoined` fired).
    pub joined: bool,
}

/// The Parlor core engine.
pub struct Engine {
    registry: ConnectionRegistry,
    router: Arc<BroadcastRouter>,
    presence: PresenceCoordinator,
}

impl Engine {
    /// Create an engine over the given shared store.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        let router = Arc::new(BroadcastRouter::new());
        Self {
            registry: ConnectionRegistry::new(),
            presence: PresenceCoordinator::new(store, router.clone()),
            router,
        }
    }

    /// The connection registry.
    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The broadcast router.
    #[must_use]
    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// The presence coordinator.
    #[must_use]
    pub fn presence(&self) -> &PresenceCoordinator {
        &self.presence
    }

    /// Subscribe a freshly-accepted connection to global events.
    #[must_use]
    pub fn subscribe_global(&self) -> broadcast::Receiver<Arc<Event>> {
        self.router.subscribe_global()
    }

    /// Handle a set-nickname event: bind the connection, join the room's
    /// delivery group, and run the presence Join transition.
    ///
    /// Returns the room receiver on a fresh bind, `None` when the
    /// identical binding was replayed after a completed bind.
    ///
    /// # Errors
    ///
    /// `AlreadyBound` if the connection is bound to different values; a
    /// store error if the Join transition fails. On a store error the
    /// bind and delivery-group membership are rolled back, so replaying
    /// the identical frame re-runs the Join from scratch.
    pub async fn set_nickname(
        &self,
        conn_id: &str,
        username: &str,
        room_id: &str,
    ) -> Result<Option<BindOutcome>, EngineError> {
        if !self.registry.bind(conn_id, username, room_id)? {
            return Ok(None);
        }

        let receiver = self.router.join_room(conn_id, room_id);
        match self.presence.join(username, room_id, conn_id).await {
            Ok(joined) => Ok(Some(BindOutcome { receiver, joined })),
            Err(e) => {
                debug!(connection = %conn_id, "Rolling back bind after failed join");
                self.router.leave_room(conn_id, room_id);
                self.registry.unbind(conn_id);
                Err(e)
            }
        }
    }

    /// Handle a chat message from a connection.
    ///
    /// Returns the number of peers reached; blank messages reach zero.
    ///
    /// # Errors
    ///
    /// `UnboundConnection` if the connection never set a nickname.
    pub fn chat_message(&self, conn_id: &str, text: &str) -> Result<usize, EngineError> {
        let binding = self.registry.resolve(conn_id)?;
        Ok(self
            .router
            .send_message(&binding.room_id, &binding.username, text))
    }

    /// Handle a set-status event from a connection.
    ///
    /// # Errors
    ///
    /// `UnboundConnection` if the connection never set a nickname; a store
    /// error if the status write fails.
    pub async fn set_status(&self, conn_id: &str, status: &str) -> Result<(), EngineError> {
        let binding = self.registry.resolve(conn_id)?;
        self.presence.set_status(&binding.username, status).await
    }

    /// Handle a disconnect for a connection.
    ///
    /// A disconnect for an unbound or already-unbound connection is a
    /// silent no-op; replaying it never errors. Returns whether a
    /// `UserLeft` event fired.
    ///
    /// # Errors
    ///
    /// A store error if the Leave transition fails. The binding and
    /// delivery-group membership are released only after the store
    /// transition succeeds, so a failed disconnect can be retried.
    pub async fn disconnect(&self, conn_id: &str) -> Result<bool, EngineError> {
        let Ok(binding) = self.registry.resolve(conn_id) else {
            return Ok(false);
        };

        let left = self
            .presence
            .leave(&binding.username, &binding.room_id, conn_id)
            .await?;

        self.router.leave_room(conn_id, &binding.room_id);
        self.registry.unbind(conn_id);
        Ok(left)
    }
}
