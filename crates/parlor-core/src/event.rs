//! Outbound events produced by the core.
//!
//! Room-scoped events go to a single room's delivery group; `StatusChanged`
//! goes to every connected peer regardless of room.

use serde::{Deserialize, Serialize};

/// Status assigned to a user who has never set one.
pub const DEFAULT_STATUS: &str = "available";

/// An event fanned out by the broadcast router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A user became present in a room (first live connection).
    UserJoined {
        /// The joining user.
        username: String,
        /// The user's stored status at join time.
        status: String,
    },

    /// A user's last connection to a room dropped.
    UserLeft {
        /// The departing user.
        username: String,
    },

    /// A chat message broadcast to room peers.
    NewMessage {
        /// The sender.
        username: String,
        /// The message text, verbatim.
        text: String,
    },

    /// A user changed their availability status (global scope).
    StatusChanged {
        /// The user whose status changed.
        username: String,
        /// The new status.
        status: String,
    },
}

impl Event {
    /// Create a `UserJoined` event.
    #[must_use]
    pub fn user_joined(username: impl Into<String>, status: impl Into<String>) -> Self {
        Event::UserJoined {
            username: username.into(),
            status: status.into(),
        }
    }

    /// Create a `UserLeft` event.
    #[must_use]
    pub fn user_left(username: impl Into<String>) -> Self {
        Event::UserLeft {
            username: username.into(),
        }
    }

    /// Create a `NewMessage` event.
    #[must_use]
    pub fn new_message(username: impl Into<String>, text: impl Into<String>) -> Self {
        Event::NewMessage {
            username: username.into(),
            text: text.into(),
        }
    }

    /// Create a `StatusChanged` event.
    #[must_use]
    pub fn status_changed(username: impl Into<String>, status: impl Into<String>) -> Self {
        Event::StatusChanged {
            username: username.into(),
            status: status.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = Event::user_joined("alice", "available");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "user_joined");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["status"], "available");
    }

    #[test]
    fn test_event_roundtrip() {
        let event = Event::new_message("bob", "hi there");
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
