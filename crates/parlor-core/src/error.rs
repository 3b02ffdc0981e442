//! Error taxonomy for core operations.

use parlor_store::StoreError;
use thiserror::Error;

/// Errors surfaced to the transport boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation referenced a connection before it set a nickname.
    ///
    /// The transport should drop or log the inbound event, never tear
    /// down the connection loop.
    #[error("Connection not bound: {0}")]
    UnboundConnection(String),

    /// A connection tried to re-bind with a different nickname or room.
    ///
    /// The existing binding stays intact; only this request is rejected.
    #[error("Connection already bound: {0}")]
    AlreadyBound(String),

    /// A shared-store operation failed; the transition aborted before any
    /// broadcast. The caller may retry the inbound event.
    #[error(transparent)]
    Store(#[from] StoreError),
}
