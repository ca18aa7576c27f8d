//! Error types for the dashboard channel.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while building or driving a dashboard channel.
///
/// None of these cross the [`Controller`](crate::Controller) boundary: the
/// controller turns them into an `Errored` state with a readable message.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No dashboard endpoint was configured.
    #[error("API endpoint is not configured")]
    MissingEndpoint,

    /// The configured endpoint could not be parsed.
    #[error("Invalid API endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A single handshake attempt took longer than the configured timeout.
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The Socket.IO client failed to open a session.
    #[error("Socket.IO error: {0}")]
    SocketIo(String),

    /// The client reported a failure before the namespace was joined.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server refused the namespace connection (CONNECT_ERROR).
    #[error("Server rejected the connection: {0}")]
    Rejected(String),

    /// The session closed before the namespace was joined.
    #[error("Transport closed during handshake")]
    Closed,

    /// The channel was configured without any transport.
    #[error("No transport configured")]
    NoTransport,

    /// The channel's event stream has already been taken by a binding.
    #[error("Channel events are already bound")]
    AlreadyBound,

    /// `connect` was called outside of a Tokio runtime.
    #[error("No async runtime available to drive the channel")]
    NoRuntime,
}

impl ChannelError {
    /// Returns true for errors that retrying cannot fix.
    ///
    /// Missing or malformed configuration and an explicit server rejection
    /// are fatal for the attempt; everything else may be transient.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChannelError::MissingEndpoint
                | ChannelError::InvalidEndpoint { .. }
                | ChannelError::Rejected(_)
                | ChannelError::NoTransport
                | ChannelError::AlreadyBound
                | ChannelError::NoRuntime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ChannelError::MissingEndpoint.is_fatal());
        assert!(ChannelError::Rejected("bad token".to_string()).is_fatal());
        assert!(!ChannelError::Timeout(Duration::from_secs(10)).is_fatal());
        assert!(!ChannelError::Closed.is_fatal());
        assert!(!ChannelError::Transport("reset".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ChannelError::SocketIo("connection refused".to_string());
        assert_eq!(err.to_string(), "Socket.IO error: connection refused");
        assert_eq!(
            ChannelError::Timeout(Duration::from_secs(10)).to_string(),
            "Handshake timed out after 10s"
        );
    }
}
