//! Key builders for every entry Parlor writes to the shared store.
//!
//! Centralising key construction keeps the schema in one place and makes
//! it easy to see everything the engine stores.

/// Set of connection ids currently open for a user.
pub fn user_connections(username: &str) -> String {
    format!("users:{username}:connections")
}

/// Last-write-wins availability status for a user.
pub fn user_status(username: &str) -> String {
    format!("users:{username}:status")
}

/// Set of usernames currently present in a room.
pub fn room_online(room_id: &str) -> String {
    format!("rooms:{room_id}:online")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(user_connections("alice"), "users:alice:connections");
        assert_eq!(user_status("alice"), "users:alice:status");
        assert_eq!(room_online("lobby"), "rooms:lobby:online");
    }
}
