//! Error payload pushed by the dashboard server.

/// Body of a `dashboard:error` event.
///
/// Application-level errors leave the channel open; the client shows the
/// message next to whatever data it already has.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorPayload {
    /// Server-provided description of the failure.
    #[cfg_attr(feature = "serde", serde(default))]
    pub message: String,
}

impl ErrorPayload {
    /// Create an error payload.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
