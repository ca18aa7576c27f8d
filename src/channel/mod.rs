//! Dashboard channel: a persistent, authenticated push connection.
//!
//! A channel is built per connection attempt by a [`ChannelFactory`], bound
//! to one endpoint and one credential. It owns its own bounded retry policy
//! and reports everything that happens to it as [`WireEvent`]s, which the
//! [`binder`](crate::binder) translates for the controller.
//!
//! ```text
//! ChannelFactory::create(endpoint, token)
//!        │
//!        ▼
//! SocketChannel ──connect()──▶ Manager task ──▶ rust_socketio (WebSocket │ Polling)
//!        │                          │
//!        └── take_events() ◀── WireEvent stream
//! ```

mod manager;
mod memory;
mod transport;

pub use manager::SocketChannel;
pub use memory::{MemoryChannel, MemoryChannelFactory, MemoryHandle};
pub use transport::TransportKind;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::info;
use url::Url;

use crate::error::ChannelError;

/// Sub-path appended to the configured endpoint.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Query parameter carrying the bearer credential on the handshake.
pub const TOKEN_PARAM: &str = "token";

/// Automatic reconnection attempts before giving up.
pub const RECONNECTION_ATTEMPTS: u32 = 5;

/// Fixed delay between automatic reconnection attempts.
pub const RECONNECTION_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound for a single handshake attempt.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default Engine.IO request path.
pub const ENGINE_PATH: &str = "/socket.io/";

/// Disconnect reasons reported in `disconnect` events.
pub mod reason {
    /// The server closed the namespace; the channel will not retry on its own.
    pub const SERVER_DISCONNECT: &str = "io server disconnect";
    /// The client asked to disconnect.
    pub const CLIENT_DISCONNECT: &str = "io client disconnect";
    /// The client went away underneath the session.
    pub const TRANSPORT_CLOSE: &str = "transport close";
    /// The transport failed while reading or writing.
    pub const TRANSPORT_ERROR: &str = "transport error";
}

/// Channel configuration.
///
/// The defaults are the dashboard's fixed policy: WebSocket first with
/// long-polling fallback, five retries one second apart, ten-second
/// handshakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Transports to try, in order.
    pub transports: Vec<TransportKind>,
    /// Whether the channel retries on its own after unexpected closes.
    pub reconnection: bool,
    /// Retries before `reconnect_failed` is reported.
    pub reconnection_attempts: u32,
    /// Delay before each retry.
    pub reconnection_delay: Duration,
    /// Bound for a single handshake attempt.
    pub timeout: Duration,
    /// Engine.IO request path on the server.
    pub path: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnection: true,
            reconnection_attempts: RECONNECTION_ATTEMPTS,
            reconnection_delay: RECONNECTION_DELAY,
            timeout: HANDSHAKE_TIMEOUT,
            path: ENGINE_PATH.to_string(),
        }
    }
}

/// The address a channel connects to: `<endpoint>/dashboard?token=<credential>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTarget {
    url: Url,
}

impl ChannelTarget {
    /// Build the target for an endpoint and credential.
    ///
    /// Fails with [`ChannelError::MissingEndpoint`] when the endpoint is
    /// blank, and [`ChannelError::InvalidEndpoint`] when it does not parse
    /// as an http(s) or ws(s) URL.
    pub fn new(endpoint: &str, credential: &str) -> Result<Self, ChannelError> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ChannelError::MissingEndpoint);
        }

        let invalid = |reason: String| ChannelError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let base = endpoint.trim_end_matches('/');
        let mut url =
            Url::parse(&format!("{}{}", base, DASHBOARD_PATH)).map_err(|e| invalid(e.to_string()))?;

        match url.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            other => return Err(invalid(format!("unsupported scheme '{}'", other))),
        }

        url.query_pairs_mut().append_pair(TOKEN_PARAM, credential);
        Ok(Self { url })
    }

    /// The full target URL, credential included.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Socket.IO namespace: the path of the target URL.
    pub fn namespace(&self) -> &str {
        self.url.path()
    }

    /// The target URL with the credential masked, for logs and status lines.
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == TOKEN_PARAM { "***".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }

    /// Address handed to the Socket.IO client: the endpoint's origin with
    /// the Engine.IO `path` and the target's query (credential included).
    pub fn socket_url(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        let scheme = match url.scheme() {
            "wss" => "https",
            "ws" => "http",
            other => other,
        }
        .to_string();
        // Switching between special schemes never fails.
        let _ = url.set_scheme(&scheme);
        url.set_path(path);
        url
    }

    /// Mask the credential wherever it appears in `text`.
    pub fn scrub(&self, text: &str) -> String {
        let Some(token) = self
            .url
            .query_pairs()
            .find(|(k, _)| k == TOKEN_PARAM)
            .map(|(_, v)| v.into_owned())
            .filter(|t| !t.is_empty())
        else {
            return text.to_string();
        };
        let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
        text.replace(&encoded, "***").replace(&token, "***")
    }
}

/// One event as it appears on the wire: a name and its JSON arguments.
///
/// Lifecycle events produced by the channel itself use the same shape as
/// events pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub name: String,
    pub args: Vec<Value>,
}

impl WireEvent {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn connect() -> Self {
        Self::new("connect", Vec::new())
    }

    pub fn disconnect(reason: &str) -> Self {
        Self::new("disconnect", vec![Value::String(reason.to_string())])
    }

    pub fn connect_error(message: &str) -> Self {
        Self::new("connect_error", vec![json!({ "message": message })])
    }

    pub fn reconnect_attempt(attempt: u32) -> Self {
        Self::new("reconnect_attempt", vec![json!(attempt)])
    }

    pub fn reconnect(attempt: u32) -> Self {
        Self::new("reconnect", vec![json!(attempt)])
    }

    pub fn reconnect_failed() -> Self {
        Self::new("reconnect_failed", Vec::new())
    }
}

/// A configured connection to the dashboard endpoint.
///
/// All operations are fire-and-forget: they return immediately and their
/// effect is observed through the event stream.
pub trait Channel: Send + Sync + Debug {
    /// Start connecting. No-op while a session or attempt is live.
    fn connect(&self);

    /// Close the current session without retrying.
    fn disconnect(&self);

    /// Tear the channel down for good. Safe to call more than once.
    fn close(&self);

    /// Take the channel's event stream. Returns `None` once taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<WireEvent>>;

    /// Human-readable description, credential masked.
    fn description(&self) -> &str;
}

/// Builds one channel per connection attempt.
pub trait ChannelFactory: Send + Sync {
    /// Create an unconnected channel for `endpoint`, authenticated with
    /// `credential`. Fails fast on configuration errors.
    fn create(&self, endpoint: &str, credential: &str) -> Result<Arc<dyn Channel>, ChannelError>;
}

/// Factory for Socket.IO channels.
#[derive(Debug, Clone, Default)]
pub struct SocketChannelFactory {
    options: ChannelOptions,
}

impl SocketChannelFactory {
    pub fn new(options: ChannelOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }
}

impl ChannelFactory for SocketChannelFactory {
    fn create(&self, endpoint: &str, credential: &str) -> Result<Arc<dyn Channel>, ChannelError> {
        let target = ChannelTarget::new(endpoint, credential)?;
        info!(target = %target.redacted(), "creating dashboard channel");
        Ok(Arc::new(SocketChannel::new(target, self.options.clone())))
    }
}
