//! Driver error types.
//!
//! These surface from [`ServerDriver::process_event`](crate::ServerDriver)
//! when an event cannot be applied at all. Anything a client can cause by
//! sending bad data is logged and dropped instead, so these never close a
//! healthy connection.

use crashline_proto::ProtocolError;
use thiserror::Error;

/// Errors that can occur while processing a server event.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Event referenced a session the registry does not know.
    ///
    /// Transient if the session was just closed; the runtime drops the
    /// event.
    #[error("session not found: {0}")]
    SessionNotFound(u64),

    /// Outbound message could not be encoded.
    ///
    /// Indicates a message exceeding the frame size limit. A bug in the
    /// message builders, not a client fault.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
