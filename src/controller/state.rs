//! Connection state and the reducer that drives it.

use std::fmt;

use pulse_types::MetricSnapshot;
use serde::Serialize;

use crate::binder::ChannelEvent;
use crate::channel::reason;

/// The four connection states. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    /// Display label for badges and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Errored => "Error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where an error came from, which decides how it is worded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing credential or endpoint. Retrying cannot help.
    Configuration,
    /// A handshake attempt failed.
    Handshake,
    /// The channel gave up retrying.
    RetriesExhausted,
    /// The server reported an application error over a live channel.
    Application,
}

/// An error shown alongside the connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ConnectionError {
    /// No credential could be read.
    pub fn not_authenticated() -> Self {
        Self {
            kind: ErrorKind::Configuration,
            message: "No authentication token found. Please log in again.".to_string(),
        }
    }

    /// The channel could not be built from the current configuration.
    pub fn configuration(detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Configuration,
            message: format!("Configuration error: {}", detail),
        }
    }

    pub fn handshake(detail: &str) -> Self {
        let detail = if detail.is_empty() { "unknown error" } else { detail };
        Self {
            kind: ErrorKind::Handshake,
            message: format!("Connection error: {}. Check your network.", detail),
        }
    }

    pub fn retries_exhausted() -> Self {
        Self {
            kind: ErrorKind::RetriesExhausted,
            message: "Could not reconnect to the server after several attempts.".to_string(),
        }
    }

    pub fn application(detail: &str) -> Self {
        let message = if detail.is_empty() {
            "The server rejected the dashboard data.".to_string()
        } else {
            detail.to_string()
        };
        Self {
            kind: ErrorKind::Application,
            message,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Side effects the reducer asks the controller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Call `connect()` on the current channel once.
    RequestConnect,
}

/// Everything the UI reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DashboardView {
    pub connection_state: ConnectionState,
    pub last_snapshot: Option<MetricSnapshot>,
    pub last_error: Option<ConnectionError>,
}

impl DashboardView {
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.connection_state == ConnectionState::Connecting
    }

    pub fn is_disconnected(&self) -> bool {
        self.connection_state == ConnectionState::Disconnected
    }

    pub fn has_error(&self) -> bool {
        self.connection_state == ConnectionState::Errored
    }

    /// Apply one channel event in place.
    ///
    /// A server disconnect leaves the view `Disconnected` and returns
    /// [`Directive::RequestConnect`]; moving on to `Connecting` is a separate
    /// step taken by whoever issues the connect.
    pub fn apply(&mut self, event: ChannelEvent) -> Option<Directive> {
        match event {
            ChannelEvent::Connect | ChannelEvent::Reconnected { .. } => {
                self.connection_state = ConnectionState::Connected;
                self.last_error = None;
            }
            ChannelEvent::Update { snapshot } => {
                self.connection_state = ConnectionState::Connected;
                self.last_snapshot = Some(snapshot);
                self.last_error = None;
            }
            ChannelEvent::AppError { message } => {
                self.last_error = Some(ConnectionError::application(&message));
            }
            ChannelEvent::ConnectError { message } => {
                self.fail(ConnectionError::handshake(&message));
            }
            ChannelEvent::ReconnectAttempt { .. } => {
                self.connection_state = ConnectionState::Connecting;
            }
            ChannelEvent::ReconnectFailed => {
                self.fail(ConnectionError::retries_exhausted());
            }
            ChannelEvent::Disconnect { reason: why } => {
                self.connection_state = ConnectionState::Disconnected;
                if why == reason::SERVER_DISCONNECT {
                    return Some(Directive::RequestConnect);
                }
            }
        }
        None
    }

    /// Move to `Errored` with an error.
    pub fn fail(&mut self, error: ConnectionError) {
        self.connection_state = ConnectionState::Errored;
        self.last_error = Some(error);
    }

    /// Start a manual connect. Returns false when one is already live.
    pub fn begin_connect(&mut self) -> bool {
        match self.connection_state {
            ConnectionState::Connecting | ConnectionState::Connected => false,
            ConnectionState::Disconnected | ConnectionState::Errored => {
                self.connection_state = ConnectionState::Connecting;
                true
            }
        }
    }

    /// Manual disconnect. Returns true if anything changed.
    pub fn mark_disconnected(&mut self) -> bool {
        let changed = self.connection_state != ConnectionState::Disconnected;
        self.connection_state = ConnectionState::Disconnected;
        changed
    }
}

/// Pure form of [`DashboardView::apply`].
pub fn reduce(mut view: DashboardView, event: ChannelEvent) -> (DashboardView, Option<Directive>) {
    let directive = view.apply(event);
    (view, directive)
}
