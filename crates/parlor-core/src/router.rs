//! Broadcast router.
//!
//! Fans events out to delivery groups: one per room, plus a global group
//! every live connection belongs to. Delivery groups are process-local and
//! ephemeral; they mirror the connection registry, not the shared store.
//! Delivery is best-effort and at-most-once per connected peer.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::event::Event;

/// Broadcast capacity per delivery group.
const GROUP_CAPACITY: usize = 1024;

/// A room's delivery group.
#[derive(Debug)]
struct DeliveryGroup {
    /// Broadcast sender for this room.
    sender: broadcast::Sender<Arc<Event>>,
    /// Connection ids currently in the group.
    members: HashSet<String>,
}

impl DeliveryGroup {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(GROUP_CAPACITY);
        Self {
            sender,
            members: HashSet::new(),
        }
    }
}

/// Routes events to room-scoped or global audiences.
#[derive(Debug)]
pub struct BroadcastRouter {
    /// Delivery groups indexed by room id.
    rooms: DashMap<String, DeliveryGroup>,
    /// Global group reaching every connection.
    global: broadcast::Sender<Arc<Event>>,
}

impl BroadcastRouter {
    /// Create a new router.
    #[must_use]
    pub fn new() -> Self {
        let (global, _) = broadcast::channel(GROUP_CAPACITY);
        Self {
            rooms: DashMap::new(),
            global,
        }
    }

    /// Subscribe a connection to the global delivery group.
    ///
    /// Every connection subscribes once, at accept time, so that global
    /// events reach peers that have not yet bound to a room.
    #[must_use]
    pub fn subscribe_global(&self) -> broadcast::Receiver<Arc<Event>> {
        self.global.subscribe()
    }

    /// Add a connection to a room's delivery group.
    ///
    /// Returns a receiver for the room's events. The group is created on
    /// first join.
    pub fn join_room(&self, conn_id: &str, room_id: &str) -> broadcast::Receiver<Arc<Event>> {
        let mut group = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(DeliveryGroup::new);

        group.members.insert(conn_id.to_string());
        debug!(room = %room_id, connection = %conn_id, members = group.members.len(), "Joined delivery group");
        group.sender.subscribe()
    }

    /// Remove a connection from a room's delivery group. Idempotent.
    ///
    /// Empty groups are dropped.
    pub fn leave_room(&self, conn_id: &str, room_id: &str) {
        if let Some(mut group) = self.rooms.get_mut(room_id) {
            if group.members.remove(conn_id) {
                debug!(room = %room_id, connection = %conn_id, members = group.members.len(), "Left delivery group");
            }
            if group.members.is_empty() {
                drop(group); // Release the lock
                self.rooms.remove(room_id);
                debug!(room = %room_id, "Dropped empty delivery group");
            }
        }
    }

    /// Number of connections in a room's delivery group.
    #[must_use]
    pub fn room_size(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |g| g.members.len())
    }

    /// Deliver an event to every connection in a room.
    ///
    /// Returns the number of receivers reached.
    pub fn deliver_to_room(&self, room_id: &str, event: Event) -> usize {
        if let Some(group) = self.rooms.get(room_id) {
            trace!(room = %room_id, ?event, "Delivering to room");
            group.sender.send(Arc::new(event)).unwrap_or_default()
        } else {
            trace!(room = %room_id, "Delivery to room with no live members");
            0
        }
    }

    /// Deliver an event to every connected peer across all rooms.
    ///
    /// Returns the number of receivers reached.
    pub fn deliver_global(&self, event: Event) -> usize {
        trace!(?event, "Delivering globally");
        self.global.send(Arc::new(event)).unwrap_or_default()
    }

    /// Broadcast a chat message to a room.
    ///
    /// Text that is empty once line-break characters are stripped is
    /// silently dropped; otherwise the original text is broadcast verbatim.
    /// Returns the number of receivers reached.
    pub fn send_message(&self, room_id: &str, username: &str, text: &str) -> usize {
        if text.replace(['\n', '\r'], "").is_empty() {
            trace!(room = %room_id, username = %username, "Dropping blank message");
            return 0;
        }
        self.deliver_to_room(room_id, Event::new_message(username, text))
    }
}

impl Default for BroadcastRouter {
    fn default() -> Self {
        Self::new()
    }
}
