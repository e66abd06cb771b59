//! Server runtime error types.

use std::fmt;

use crate::server_error::DriverError;

/// Errors that stop the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, inconsistent engine
    /// settings).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (bind failure, accept failure, I/O error).
    ///
    /// Accept failures are logged and retried; bind failures are fatal.
    Transport(String),

    /// Protocol error (invalid frame, oversize message).
    ///
    /// Fatal for the offending connection only.
    Protocol(String),

    /// Internal error (unexpected state, logic bug).
    ///
    /// Should never happen in a correct implementation.
    Internal(String),

    /// Error from `ServerDriver` processing.
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<crashline_proto::ProtocolError> for ServerError {
    fn from(err: crashline_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<crashline_core::ConfigError> for ServerError {
    fn from(err: crashline_core::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_category() {
        assert_eq!(ServerError::Config("bad bind".into()).to_string(), "configuration error: bad bind");
        assert_eq!(
            ServerError::from(DriverError::SessionNotFound(9)).to_string(),
            "driver error: session not found: 9"
        );
    }

    #[test]
    fn driver_error_is_source() {
        use std::error::Error;

        let err = ServerError::from(DriverError::SessionNotFound(1));
        assert!(err.source().is_some());
        assert!(ServerError::Internal("x".into()).source().is_none());
    }
}
