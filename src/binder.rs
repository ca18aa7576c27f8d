//! Translation of wire events into typed [`ChannelEvent`]s.
//!
//! The binder is a pure adapter: it decodes payloads and passes them on
//! without interpreting them. Names outside the dashboard vocabulary and
//! payloads that fail to decode are logged and dropped.

use pulse_types::{ErrorPayload, MetricSnapshot};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::channel::{Channel, WireEvent};
use crate::error::ChannelError;

/// Wire names of the events the dashboard reacts to.
pub mod names {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const UPDATE: &str = "dashboard:update";
    pub const ERROR: &str = "dashboard:error";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const RECONNECT_ATTEMPT: &str = "reconnect_attempt";
    pub const RECONNECT: &str = "reconnect";
    pub const RECONNECT_FAILED: &str = "reconnect_failed";
}

/// Everything a dashboard channel can tell the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Handshake completed.
    Connect,
    /// Session ended; `reason` is the channel's disconnect reason.
    Disconnect { reason: String },
    /// The server pushed a fresh snapshot.
    Update { snapshot: MetricSnapshot },
    /// The server reported an application-level error.
    AppError { message: String },
    /// A handshake attempt failed.
    ConnectError { message: String },
    /// The channel is about to retry (1-based).
    ReconnectAttempt { attempt: u32 },
    /// A retry succeeded.
    Reconnected { attempt: u32 },
    /// Retries are exhausted.
    ReconnectFailed,
}

impl ChannelEvent {
    /// Translate one wire event. Returns `None` for events to drop.
    pub fn from_wire(event: WireEvent) -> Option<Self> {
        let WireEvent { name, args } = event;
        let first = args.into_iter().next();

        let translated = match name.as_str() {
            names::CONNECT => ChannelEvent::Connect,
            names::DISCONNECT => ChannelEvent::Disconnect {
                reason: first
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            names::UPDATE => {
                let payload = first.unwrap_or(Value::Null);
                match serde_json::from_value::<MetricSnapshot>(payload) {
                    Ok(snapshot) => ChannelEvent::Update { snapshot },
                    Err(e) => {
                        warn!(error = %e, "dropping malformed dashboard update");
                        return None;
                    }
                }
            }
            names::ERROR => ChannelEvent::AppError {
                message: message_of(first),
            },
            names::CONNECT_ERROR => ChannelEvent::ConnectError {
                message: message_of(first),
            },
            names::RECONNECT_ATTEMPT => ChannelEvent::ReconnectAttempt {
                attempt: attempt_of(first),
            },
            names::RECONNECT => ChannelEvent::Reconnected {
                attempt: attempt_of(first),
            },
            names::RECONNECT_FAILED => ChannelEvent::ReconnectFailed,
            other => {
                trace!(event = other, "ignoring unknown event");
                return None;
            }
        };
        Some(translated)
    }

    /// The wire name this event was received under.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::Connect => names::CONNECT,
            ChannelEvent::Disconnect { .. } => names::DISCONNECT,
            ChannelEvent::Update { .. } => names::UPDATE,
            ChannelEvent::AppError { .. } => names::ERROR,
            ChannelEvent::ConnectError { .. } => names::CONNECT_ERROR,
            ChannelEvent::ReconnectAttempt { .. } => names::RECONNECT_ATTEMPT,
            ChannelEvent::Reconnected { .. } => names::RECONNECT,
            ChannelEvent::ReconnectFailed => names::RECONNECT_FAILED,
        }
    }
}

/// `{ "message": .. }` objects and bare strings both carry a message.
fn message_of(payload: Option<Value>) -> String {
    match payload {
        Some(Value::String(message)) => message,
        Some(value) => serde_json::from_value::<ErrorPayload>(value)
            .map(|p| p.message)
            .unwrap_or_default(),
        None => String::new(),
    }
}

fn attempt_of(payload: Option<Value>) -> u32 {
    payload
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

/// A channel's event stream, translated.
#[derive(Debug)]
pub struct Binding {
    events: mpsc::UnboundedReceiver<WireEvent>,
}

/// Attach to a channel's events.
///
/// Fails with [`ChannelError::AlreadyBound`] if the channel's stream was
/// already taken.
pub fn bind(channel: &dyn Channel) -> Result<Binding, ChannelError> {
    let events = channel.take_events().ok_or(ChannelError::AlreadyBound)?;
    Ok(Binding { events })
}

impl Binding {
    /// Next event in delivery order, or `None` when the channel is gone.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        while let Some(wire) = self.events.recv().await {
            if let Some(event) = ChannelEvent::from_wire(wire) {
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use serde_json::json;

    #[test]
    fn test_lifecycle_events() {
        assert_eq!(
            ChannelEvent::from_wire(WireEvent::connect()),
            Some(ChannelEvent::Connect)
        );
        assert_eq!(
            ChannelEvent::from_wire(WireEvent::disconnect("io server disconnect")),
            Some(ChannelEvent::Disconnect {
                reason: "io server disconnect".to_string()
            })
        );
        assert_eq!(
            ChannelEvent::from_wire(WireEvent::reconnect_attempt(2)),
            Some(ChannelEvent::ReconnectAttempt { attempt: 2 })
        );
        assert_eq!(
            ChannelEvent::from_wire(WireEvent::reconnect(3)),
            Some(ChannelEvent::Reconnected { attempt: 3 })
        );
        assert_eq!(
            ChannelEvent::from_wire(WireEvent::reconnect_failed()),
            Some(ChannelEvent::ReconnectFailed)
        );
    }

    #[test]
    fn test_update_payload_passes_through() {
        let wire = WireEvent::new(
            "dashboard:update",
            vec![json!({
                "users": [{"concepto": "Usuarios activos", "cantidad": "42"}],
                "improvementData": [{"concepto": "Planes abiertos", "cantidad": "7"}]
            })],
        );
        let Some(ChannelEvent::Update { snapshot }) = ChannelEvent::from_wire(wire) else {
            panic!("expected update");
        };
        assert_eq!(snapshot.users[0].label, "Usuarios activos");
        assert_eq!(snapshot.improvement_data[0].value, "7");
    }

    #[test]
    fn test_malformed_update_is_dropped() {
        let wire = WireEvent::new("dashboard:update", vec![json!({"users": 5})]);
        assert_eq!(ChannelEvent::from_wire(wire), None);
        assert_eq!(
            ChannelEvent::from_wire(WireEvent::new("dashboard:update", vec![])),
            None
        );
    }

    #[test]
    fn test_error_messages() {
        let app = WireEvent::new("dashboard:error", vec![json!({"message": "boom"})]);
        assert_eq!(
            ChannelEvent::from_wire(app),
            Some(ChannelEvent::AppError {
                message: "boom".to_string()
            })
        );

        let bare = WireEvent::new("connect_error", vec![json!("xhr poll error")]);
        assert_eq!(
            ChannelEvent::from_wire(bare),
            Some(ChannelEvent::ConnectError {
                message: "xhr poll error".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        let wire = WireEvent::new("objectives:changed", vec![json!({})]);
        assert_eq!(ChannelEvent::from_wire(wire), None);
    }

    #[test]
    fn test_names_round_trip() {
        for wire in [
            WireEvent::connect(),
            WireEvent::disconnect("transport close"),
            WireEvent::connect_error("x"),
            WireEvent::reconnect_attempt(1),
            WireEvent::reconnect(1),
            WireEvent::reconnect_failed(),
        ] {
            let name = wire.name.clone();
            assert_eq!(ChannelEvent::from_wire(wire).unwrap().name(), name);
        }
    }

    #[tokio::test]
    async fn test_binding_preserves_order_and_skips_noise() {
        let (handle, channel) = MemoryChannel::create("test");
        let mut binding = bind(&channel).unwrap();
        assert!(matches!(bind(&channel), Err(ChannelError::AlreadyBound)));

        handle.emit(WireEvent::connect());
        handle.emit(WireEvent::new("unknown", vec![]));
        handle.emit(WireEvent::new("dashboard:error", vec![json!({"message": "late"})]));
        handle.emit(WireEvent::disconnect("transport close"));
        drop(handle);

        assert_eq!(binding.next().await, Some(ChannelEvent::Connect));
        assert_eq!(
            binding.next().await,
            Some(ChannelEvent::AppError {
                message: "late".to_string()
            })
        );
        assert_eq!(
            binding.next().await,
            Some(ChannelEvent::Disconnect {
                reason: "transport close".to_string()
            })
        );
        // Handle dropped, so the stream ends.
        assert_eq!(binding.next().await, None);
    }
}
