//! Errors surfaced by chain sources.

use alloy_primitives::B256;
use jsonrpsee::core::ClientError;
use thiserror::Error;

/// Result type for [`ChainSource`](crate::ChainSource) calls.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that may occur while reading from a chain source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The underlying connection failed or was dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// No block exists at the requested number.
    #[error("no block at number {0}")]
    BlockNumberNotFound(u64),

    /// No block exists with the requested hash.
    #[error("no block with hash {0}")]
    BlockHashNotFound(B256),

    /// The block carries no timestamp.
    #[error("no timestamp stored at block {0}")]
    TimestampMissing(B256),

    /// A response could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// Why decoding failed.
        reason: String,
    },

    /// The new-heads subscription ended.
    #[error("head subscription closed")]
    SubscriptionClosed,

    /// The source does not support the requested capability.
    #[error("unsupported capability: {0}")]
    Unsupported(&'static str),
}

impl SourceError {
    /// Returns true if retrying the same call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::SubscriptionClosed)
    }

    /// Builds a [`SourceError::Decode`] from any displayable reason.
    pub fn decode(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Decode { what, reason: reason.to_string() }
    }
}

impl From<ClientError> for SourceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RequestTimeout => Self::Timeout,
            ClientError::Call(obj) => Self::Rpc(obj.to_string()),
            ClientError::ParseError(err) => Self::decode("rpc response", err),
            other => Self::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::transport(SourceError::Transport("reset".into()), true)]
    #[case::timeout(SourceError::Timeout, true)]
    #[case::closed(SourceError::SubscriptionClosed, true)]
    #[case::rpc(SourceError::Rpc("bad params".into()), false)]
    #[case::missing_number(SourceError::BlockNumberNotFound(7), false)]
    #[case::missing_timestamp(SourceError::TimestampMissing(B256::ZERO), false)]
    #[case::decode(SourceError::decode("header", "bad hex"), false)]
    #[case::unsupported(SourceError::Unsupported("events"), false)]
    fn test_transient_classification(#[case] err: SourceError, #[case] transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }

    #[test]
    fn test_client_timeout_maps_to_timeout() {
        assert!(matches!(SourceError::from(ClientError::RequestTimeout), SourceError::Timeout));
    }
}
