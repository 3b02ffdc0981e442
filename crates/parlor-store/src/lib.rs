//! # parlor-store
//!
//! Shared state store boundary for the Parlor realtime engine.
//!
//! All cross-connection state (per-user connection sets, per-user status,
//! per-room online-member sets) lives behind the [`StateStore`] trait. The
//! trait exposes only operations the backing store can perform atomically
//! per key; the core composes them into race-safe presence transitions by
//! gating on their return values.
//!
//! Two providers are included:
//!
//! - [`MemoryStore`] - in-process, for tests and single-node deployments
//! - [`RedisStore`] - Redis sets and scalars, shared across server processes

pub mod keys;
pub mod memory;
pub mod redis;
pub mod store;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use store::{StateStore, StoreError, StoreResult};
