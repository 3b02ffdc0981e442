//! The `StateStore` trait and store error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed in transit.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic per-key operations against the shared state store.
///
/// Every method maps to a single store-side atomic operation. The set
/// mutations report whether they changed anything; presence transitions in
/// the core are gated on exactly those return values, so two server
/// processes sharing one store cannot double-fire a join or leave event.
/// Cardinality reads are atomic but must only decide whether to *attempt*
/// a removal, never whether to emit an event.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Add a connection id to a user's connection set.
    ///
    /// Returns `true` if the id was not already in the set.
    async fn add_connection(&self, username: &str, conn_id: &str) -> StoreResult<bool>;

    /// Remove a connection id from a user's connection set.
    ///
    /// Returns `true` if the id was in the set.
    async fn remove_connection(&self, username: &str, conn_id: &str) -> StoreResult<bool>;

    /// Number of connections currently registered for a user.
    async fn connection_count(&self, username: &str) -> StoreResult<u64>;

    /// Add a username to a room's online-member set.
    ///
    /// Returns `true` if the user was not already a member.
    async fn add_online_member(&self, room_id: &str, username: &str) -> StoreResult<bool>;

    /// Remove a username from a room's online-member set.
    ///
    /// Returns `true` if the user was a member.
    async fn remove_online_member(&self, room_id: &str, username: &str) -> StoreResult<bool>;

    /// Usernames currently present in a room.
    async fn online_members(&self, room_id: &str) -> StoreResult<Vec<String>>;

    /// Overwrite a user's status (last write wins).
    async fn set_status(&self, username: &str, status: &str) -> StoreResult<()>;

    /// Read a user's status, if one has ever been set.
    async fn status(&self, username: &str) -> StoreResult<Option<String>>;
}
