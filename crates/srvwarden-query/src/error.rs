//! Query error types.

use srvwarden_core::CheckError;
use thiserror::Error;

/// Why a response could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response ended early")]
    UnexpectedEnd,

    #[error("expected response type 0x{expected:02x}, got 0x{found:02x}")]
    UnexpectedType { expected: u8, found: u8 },

    #[error("unknown packet header {0:02x?}")]
    UnknownHeader([u8; 4]),

    #[error("challenge reply carries no token")]
    MissingChallenge,

    #[error("server answered the challenged request with another challenge")]
    RepeatedChallenge,

    #[error("compressed split responses are not supported")]
    CompressedSplit,

    #[error("split fragment {number} out of range for {total} fragments")]
    BadFragment { number: u8, total: u8 },

    #[error("rules response holds {0} strings, need at least 2")]
    TooFewRules(usize),
}

/// Failure of a query call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("No query response from {endpoint}")]
    NoResponse { endpoint: String },

    #[error("Malformed query response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: ParseError,
    },

    #[error("Query socket error for {endpoint}: {reason}")]
    Io { endpoint: String, reason: String },
}

impl QueryError {
    pub(crate) fn io(endpoint: &str, err: impl ToString) -> Self {
        Self::Io {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn parse(endpoint: &str, source: ParseError) -> Self {
        Self::Parse {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

impl From<QueryError> for CheckError {
    fn from(err: QueryError) -> Self {
        let message = err.to_string();
        match err {
            QueryError::NoResponse { .. } => Self::NoResponse(message),
            QueryError::Parse { .. } => Self::Parse(message),
            QueryError::Io { .. } => Self::Connection(message),
        }
    }
}
