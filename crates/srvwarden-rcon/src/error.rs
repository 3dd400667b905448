//! RCON error types.
//!
//! Messages name the endpoint but never the credential.

use std::io;

use srvwarden_core::CheckError;
use thiserror::Error;

/// Framing errors raised while decoding a packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("declared packet size {0} is out of range")]
    InvalidSize(i32),

    #[error("packet is missing its null terminators")]
    MissingTerminator,
}

/// Failure of an RCON operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RconError {
    /// Nothing arrived within the read timeout, after the retry.
    #[error("No response from RCON at {endpoint}")]
    NoResponse { endpoint: String },

    /// The server answered the auth request with id -1.
    #[error("RCON authentication rejected by {endpoint}")]
    Authentication { endpoint: String },

    /// Refused, reset, closed or otherwise unusable connection.
    #[error("RCON connection to {endpoint} failed: {reason}")]
    ConnectionFault { endpoint: String, reason: String },

    /// Malformed packet or response payload.
    #[error("Malformed RCON response from {endpoint}: {reason}")]
    Parse { endpoint: String, reason: String },
}

impl RconError {
    pub(crate) fn no_response(endpoint: &str) -> Self {
        Self::NoResponse {
            endpoint: endpoint.to_string(),
        }
    }

    pub(crate) fn connection(endpoint: &str, reason: impl ToString) -> Self {
        Self::ConnectionFault {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(endpoint: &str, reason: impl ToString) -> Self {
        Self::Parse {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the pooled connection must be discarded after this error.
    pub const fn evicts_connection(&self) -> bool {
        !matches!(self, Self::NoResponse { .. })
    }
}

impl From<RconError> for CheckError {
    fn from(err: RconError) -> Self {
        let message = err.to_string();
        match err {
            RconError::NoResponse { .. } => Self::NoResponse(message),
            RconError::Authentication { .. } => Self::Authentication(message),
            RconError::ConnectionFault { .. } => Self::Connection(message),
            RconError::Parse { .. } => Self::Parse(message),
        }
    }
}

/// Errors after which the socket cannot carry another write.
pub(crate) fn is_broken_pipe(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_endpoint() {
        let err = RconError::Authentication {
            endpoint: "10.0.0.1:27020".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "RCON authentication rejected by 10.0.0.1:27020"
        );
    }

    #[test]
    fn test_check_error_mapping() {
        let check: CheckError = RconError::no_response("h:1").into();
        assert!(matches!(check, CheckError::NoResponse(_)));

        let check: CheckError = RconError::connection("h:1", "reset").into();
        assert_eq!(
            check,
            CheckError::Connection("RCON connection to h:1 failed: reset".to_string())
        );
    }

    #[test]
    fn test_broken_pipe_class() {
        assert!(is_broken_pipe(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_broken_pipe(&io::Error::from(
            io::ErrorKind::ConnectionReset
        )));
        assert!(!is_broken_pipe(&io::Error::from(io::ErrorKind::TimedOut)));
    }

    #[test]
    fn test_only_timeouts_keep_connection() {
        assert!(!RconError::no_response("h:1").evicts_connection());
        assert!(RconError::parse("h:1", "x").evicts_connection());
    }
}
