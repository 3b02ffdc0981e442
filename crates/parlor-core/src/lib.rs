//! # parlor-core
//!
//! Presence tracking and broadcast coordination for the Parlor realtime
//! engine.
//!
//! This crate provides the core components:
//!
//! - **ConnectionRegistry** - maps live connection ids to their user and room
//! - **PresenceCoordinator** - the join/leave/status state machine
//! - **BroadcastRouter** - delivers events room-scoped or globally
//! - **Engine** - facade wiring the three together per inbound event
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │  Inbound   │───▶│  ConnectionRegistry  │───▶│    Presence     │
//! │   event    │    └──────────────────────┘    │   Coordinator   │
//! └────────────┘                                └─────────────────┘
//!                                                   │          │
//!                                        ┌──────────▼──┐   ┌───▼─────────┐
//!                                        │ StateStore  │   │  Broadcast  │
//!                                        │  (shared)   │   │   Router    │
//!                                        └─────────────┘   └─────────────┘
//! ```
//!
//! All decision-bearing state lives in the shared [`parlor_store::StateStore`];
//! the registry and delivery groups are process-local and ephemeral.

pub mod engine;
pub mod error;
pub mod event;
pub mod presence;
pub mod registry;
pub mod router;

pub use engine::{BindOutcome, Engine};
pub use error::EngineError;
pub use event::{Event, DEFAULT_STATUS};
pub use presence::PresenceCoordinator;
pub use registry::{Binding, ConnectionRegistry};
pub use router::BroadcastRouter;
