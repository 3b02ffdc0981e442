//! Presence coordinator.
//!
//! Owns the per-user join/leave/status state machine and decides when
//! membership events fire. Every decision is gated on the return value of
//! a single atomic store mutation, never on a separately-read count, so
//! concurrent transitions for the same user cannot double-fire events -
//! even across server processes sharing one store.

use std::sync::Arc;

use parlor_store::StateStore;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::event::{Event, DEFAULT_STATUS};
use crate::router::BroadcastRouter;

/// Coordinates presence transitions against the shared store.
pub struct PresenceCoordinator {
    store: Arc<dyn StateStore>,
    router: Arc<BroadcastRouter>,
}

impl PresenceCoordinator {
    /// Create a coordinator over the given store and router.
    pub fn new(store: Arc<dyn StateStore>, router: Arc<BroadcastRouter>) -> Self {
        Self { store, router }
    }

    /// Register a connection for a user in a room.
    ///
    /// Emits `UserJoined` to the room exactly when the online-set add
    /// reports the user as a new member. Returns `true` if the event fired.
    ///
    /// # Errors
    ///
    /// Returns a store error if any store operation fails; nothing is
    /// broadcast in that case.
    pub async fn join(
        &self,
        username: &str,
        room_id: &str,
        conn_id: &str,
    ) -> Result<bool, EngineError> {
        let conn_added = self.store.add_connection(username, conn_id).await?;
        if conn_added {
            debug!(connection = %conn_id, username = %username, "Connection added to user's set");
        }

        // Status is read before the gating add so no fallible store call
        // remains between that add and the broadcast.
        let status = self
            .store
            .status(username)
            .await?
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());

        // A replayed add (retry after a failure further down this chain)
        // falls through to the same gate: the event fires only when the
        // online-set add itself reports a new member.
        let newly_present = self.store.add_online_member(room_id, username).await?;
        if !newly_present {
            return Ok(false);
        }

        info!(username = %username, room = %room_id, "User joined room");
        self.router
            .deliver_to_room(room_id, Event::user_joined(username, status));
        Ok(true)
    }

    /// Drop a connection for a user in a room.
    ///
    /// Emits `UserLeft` only when this was the user's last connection and
    /// the online-set removal reports the user was actually present.
    /// Returns `true` if the event fired.
    ///
    /// # Errors
    ///
    /// Returns a store error if any store operation fails.
    pub async fn leave(
        &self,
        username: &str,
        room_id: &str,
        conn_id: &str,
    ) -> Result<bool, EngineError> {
        let removed = self.store.remove_connection(username, conn_id).await?;
        if removed {
            debug!(connection = %conn_id, username = %username, "Connection removed from user's set");
        }

        // The count only decides whether to attempt the removal; the event
        // is gated on the removal's own result, which stays correct if a
        // concurrent join lands between the two operations. A replayed
        // remove (retry after a failure further down) falls through to the
        // same gate rather than short-circuiting.
        if self.store.connection_count(username).await? > 0 {
            return Ok(false);
        }

        let was_present = self.store.remove_online_member(room_id, username).await?;
        if !was_present {
            return Ok(false);
        }

        info!(username = %username, room = %room_id, "User left room");
        self.router
            .deliver_to_room(room_id, Event::user_left(username));
        Ok(true)
    }

    /// Set a user's status, last write wins.
    ///
    /// Always emits a global `StatusChanged`, whether or not the user is
    /// online anywhere.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails; nothing is broadcast.
    pub async fn set_status(&self, username: &str, status: &str) -> Result<(), EngineError> {
        self.store.set_status(username, status).await?;
        info!(username = %username, status = %status, "Status updated");
        self.router
            .deliver_global(Event::status_changed(username, status));
        Ok(())
    }

    /// Usernames currently present in a room, per the shared store.
    ///
    /// Read-only helper for roster rendering at the outer layer.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn online_members(&self, room_id: &str) -> Result<Vec<String>, EngineError> {
        Ok(self.store.online_members(room_id).await?)
    }

    /// A user's stored status, defaulting when never set.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn status(&self, username: &str) -> Result<String, EngineError> {
        Ok(self
            .store
            .status(username)
            .await?
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_store::MemoryStore;

    fn coordinator() -> (PresenceCoordinator, Arc<BroadcastRouter>) {
        let router = Arc::new(BroadcastRouter::new());
        let store = Arc::new(MemoryStore::new());
        (PresenceCoordinator::new(store, router.clone()), router)
    }

    #[tokio::test]
    async fn test_first_join_emits_once() {
        let (presence, router) = coordinator();
        let mut rx = router.join_room("c1", "lobby");

        assert!(presence.join("alice", "lobby", "c1").await.unwrap());
        let event = rx.try_recv().unwrap();
        assert_eq!(*event, Event::user_joined("alice", "available"));

        // Second connection, no second event.
        assert!(!presence.join("alice", "lobby", "c2").await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_reflects_stored_status() {
        let (presence, router) = coordinator();
        let mut room_rx = router.join_room("c1", "lobby");
        let mut global_rx = router.subscribe_global();

        // Status set while offline still lands, and later joins carry it.
        presence.set_status("alice", "busy").await.unwrap();
        let event = global_rx.try_recv().unwrap();
        assert_eq!(*event, Event::status_changed("alice", "busy"));

        presence.join("alice", "lobby", "c1").await.unwrap();
        let event = room_rx.try_recv().unwrap();
        assert_eq!(*event, Event::user_joined("alice", "busy"));
    }

    #[tokio::test]
    async fn test_multi_connection_leave() {
        let (presence, router) = coordinator();
        let mut rx = router.join_room("observer", "lobby");

        presence.join("alice", "lobby", "c1").await.unwrap();
        presence.join("alice", "lobby", "c2").await.unwrap();
        let _ = rx.try_recv(); // UserJoined

        // First disconnect: other connection still live, no event.
        assert!(!presence.leave("alice", "lobby", "c1").await.unwrap());
        assert!(rx.try_recv().is_err());

        // Last disconnect: exactly one UserLeft.
        assert!(presence.leave("alice", "lobby", "c2").await.unwrap());
        let event = rx.try_recv().unwrap();
        assert_eq!(*event, Event::user_left("alice"));
    }

    #[tokio::test]
    async fn test_leave_idempotent() {
        let (presence, router) = coordinator();
        let mut rx = router.join_room("observer", "lobby");

        presence.join("alice", "lobby", "c1").await.unwrap();
        let _ = rx.try_recv();

        assert!(presence.leave("alice", "lobby", "c1").await.unwrap());
        let _ = rx.try_recv();

        // Replayed disconnect for the same connection: no event, no error.
        assert!(!presence.leave("alice", "lobby", "c1").await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_joins_emit_single_event() {
        let router = Arc::new(BroadcastRouter::new());
        let store = Arc::new(MemoryStore::new());
        let presence = Arc::new(PresenceCoordinator::new(store, router.clone()));
        let mut rx = router.join_room("observer", "lobby");

        let p1 = presence.clone();
        let p2 = presence.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { p1.join("alice", "lobby", "c1").await }),
            tokio::spawn(async move { p2.join("alice", "lobby", "c2").await }),
        );

        let fired = [r1.unwrap().unwrap(), r2.unwrap().unwrap()];
        assert_eq!(fired.iter().filter(|f| **f).count(), 1);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_leaves_emit_single_event() {
        let router = Arc::new(BroadcastRouter::new());
        let store = Arc::new(MemoryStore::new());
        let presence = Arc::new(PresenceCoordinator::new(store, router.clone()));
        let mut rx = router.join_room("observer", "lobby");

        presence.join("alice", "lobby", "c1").await.unwrap();
        presence.join("alice", "lobby", "c2").await.unwrap();
        let _ = rx.try_recv();

        let p1 = presence.clone();
        let p2 = presence.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { p1.leave("alice", "lobby", "c1").await }),
            tokio::spawn(async move { p2.leave("alice", "lobby", "c2").await }),
        );

        let fired = [r1.unwrap().unwrap(), r2.unwrap().unwrap()];
        assert_eq!(fired.iter().filter(|f| **f).count(), 1);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_replay_after_partial_write() {
        let router = Arc::new(BroadcastRouter::new());
        let store = Arc::new(MemoryStore::new());
        let presence = PresenceCoordinator::new(store.clone(), router.clone());
        let mut rx = router.join_room("observer", "lobby");

        // An earlier attempt recorded the connection but died before the
        // online-set add; the replayed Join still completes it.
        store.add_connection("alice", "c1").await.unwrap();

        assert!(presence.join("alice", "lobby", "c1").await.unwrap());
        let event = rx.try_recv().unwrap();
        assert_eq!(*event, Event::user_joined("alice", "available"));
    }

    #[tokio::test]
    async fn test_leave_replay_after_partial_remove() {
        let router = Arc::new(BroadcastRouter::new());
        let store = Arc::new(MemoryStore::new());
        let presence = PresenceCoordinator::new(store.clone(), router.clone());
        let mut rx = router.join_room("observer", "lobby");

        presence.join("alice", "lobby", "c1").await.unwrap();
        let _ = rx.try_recv();

        // An earlier attempt removed the connection but died before the
        // online-set removal; the replayed Leave still emits exactly once.
        store.remove_connection("alice", "c1").await.unwrap();

        assert!(presence.leave("alice", "lobby", "c1").await.unwrap());
        assert_eq!(*rx.try_recv().unwrap(), Event::user_left("alice"));
        assert!(!presence.leave("alice", "lobby", "c1").await.unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_status_for_offline_user() {
        let (presence, router) = coordinator();
        let mut global_rx = router.subscribe_global();

        presence.set_status("alice", "busy").await.unwrap();
        let event = global_rx.try_recv().unwrap();
        assert_eq!(*event, Event::status_changed("alice", "busy"));
        assert_eq!(presence.status("alice").await.unwrap(), "busy");
    }

    #[tokio::test]
    async fn test_online_members_roster() {
        let (presence, _router) = coordinator();

        presence.join("alice", "lobby", "c1").await.unwrap();
        presence.join("bob", "lobby", "c2").await.unwrap();

        let mut members = presence.online_members("lobby").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
    }
}
