//! In-process store implementation backed by lock-free maps.
//!
//! Used as the test double and for single-node deployments where no
//! external store is configured. Each trait method is a single `DashMap`
//! or `DashSet` operation, preserving the same atomicity the Redis
//! provider gets from SADD/SREM.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::store::{StateStore, StoreResult};

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// username -> connection id set.
    connections: DashMap<String, DashSet<String>>,
    /// room id -> online username set.
    online: DashMap<String, DashSet<String>>,
    /// username -> status.
    statuses: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn add_connection(&self, username: &str, conn_id: &str) -> StoreResult<bool> {
        let set = self.connections.entry(username.to_string()).or_default();
        Ok(set.insert(conn_id.to_string()))
    }

    async fn remove_connection(&self, username: &str, conn_id: &str) -> StoreResult<bool> {
        let removed = self
            .connections
            .get(username)
            .is_some_and(|set| set.remove(conn_id).is_some());
        if removed {
            // Redis deletes a set key when its last member goes; match it
            // so the map does not grow without bound.
            self.connections.remove_if(username, |_, set| set.is_empty());
        }
        Ok(removed)
    }

    async fn connection_count(&self, username: &str) -> StoreResult<u64> {
        Ok(self
            .connections
            .get(username)
            .map_or(0, |set| set.len() as u64))
    }

    async fn add_online_member(&self, room_id: &str, username: &str) -> StoreResult<bool> {
        let set = self.online.entry(room_id.to_string()).or_default();
        Ok(set.insert(username.to_string()))
    }

    async fn remove_online_member(&self, room_id: &str, username: &str) -> StoreResult<bool> {
        let removed = self
            .online
            .get(room_id)
            .is_some_and(|set| set.remove(username).is_some());
        if removed {
            self.online.remove_if(room_id, |_, set| set.is_empty());
        }
        Ok(removed)
    }

    async fn online_members(&self, room_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .online
            .get(room_id)
            .map(|set| set.iter().map(|m| m.clone()).collect())
            .unwrap_or_default())
    }

    async fn set_status(&self, username: &str, status: &str) -> StoreResult<()> {
        self.statuses
            .insert(username.to_string(), status.to_string());
        Ok(())
    }

    async fn status(&self, username: &str) -> StoreResult<Option<String>> {
        Ok(self.statuses.get(username).map(|s| s.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_set() {
        let store = MemoryStore::new();

        assert!(store.add_connection("alice", "c1").await.unwrap());
        assert!(!store.add_connection("alice", "c1").await.unwrap());
        assert!(store.add_connection("alice", "c2").await.unwrap());
        assert_eq!(store.connection_count("alice").await.unwrap(), 2);

        assert!(store.remove_connection("alice", "c1").await.unwrap());
        assert!(!store.remove_connection("alice", "c1").await.unwrap());
        assert_eq!(store.connection_count("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_online_set() {
        let store = MemoryStore::new();

        assert!(store.add_online_member("lobby", "alice").await.unwrap());
        assert!(!store.add_online_member("lobby", "alice").await.unwrap());

        let members = store.online_members("lobby").await.unwrap();
        assert_eq!(members, vec!["alice".to_string()]);

        assert!(store.remove_online_member("lobby", "alice").await.unwrap());
        assert!(!store.remove_online_member("lobby", "alice").await.unwrap());
        assert!(store.online_members("lobby").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_last_write_wins() {
        let store = MemoryStore::new();

        assert_eq!(store.status("alice").await.unwrap(), None);
        store.set_status("alice", "available").await.unwrap();
        store.set_status("alice", "busy").await.unwrap();
        assert_eq!(
            store.status("alice").await.unwrap(),
            Some("busy".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_sets_pruned() {
        let store = MemoryStore::new();

        store.add_connection("alice", "c1").await.unwrap();
        store.remove_connection("alice", "c1").await.unwrap();
        assert!(!store.connections.contains_key("alice"));

        store.add_online_member("lobby", "alice").await.unwrap();
        store.remove_online_member("lobby", "alice").await.unwrap();
        assert!(!store.online.contains_key("lobby"));

        // A set with remaining members keeps its entry.
        store.add_connection("bob", "c1").await.unwrap();
        store.add_connection("bob", "c2").await.unwrap();
        store.remove_connection("bob", "c1").await.unwrap();
        assert!(store.connections.contains_key("bob"));
    }

    #[tokio::test]
    async fn test_empty_room_and_unknown_user() {
        let store = MemoryStore::new();

        assert_eq!(store.connection_count("ghost").await.unwrap(), 0);
        assert!(!store.remove_connection("ghost", "c1").await.unwrap());
        assert!(store.online_members("nowhere").await.unwrap().is_empty());
    }
}
