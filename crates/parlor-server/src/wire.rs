//! Inbound wire frames.
//!
//! Clients speak JSON text frames over the WebSocket; each frame is tagged
//! by `type`. Outbound traffic reuses [`parlor_core::Event`] directly.

use serde::Deserialize;

/// An event sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Bind this connection to a username and room.
    SetNickname {
        /// Externally-authenticated username.
        username: String,
        /// Room to join.
        room_id: String,
    },

    /// Broadcast a chat message to the bound room.
    Message {
        /// Message text.
        text: String,
    },

    /// Publish a new availability status.
    SetStatus {
        /// Free-form status string.
        status: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_nickname() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"set_nickname","username":"alice","room_id":"lobby"}"#)
                .unwrap();
        assert_eq!(
            frame,
            ClientFrame::SetNickname {
                username: "alice".to_string(),
                room_id: "lobby".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_message_and_status() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"message","text":"hi"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Message { .. }));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"set_status","status":"busy"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::SetStatus { .. }));
    }

    #[test]
    fn test_unknown_frame_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"nope"}"#).is_err());
    }
}
