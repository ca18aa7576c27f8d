//! Socket.IO sessions over the `rust_socketio` async client.
//!
//! The client runs its own read loop and reports through callbacks. Each
//! callback forwards a [`Signal`] into a per-attempt queue, so the manager
//! reads one ordered stream and never races the transport itself.

use std::time::Duration;

use futures_util::FutureExt;
use pulse_types::ErrorPayload;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload, TransportType};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ChannelOptions, ChannelTarget, WireEvent};
use crate::error::ChannelError;

/// Marker the client puts in front of a namespace CONNECT_ERROR.
const CONNECT_ERROR_MARK: &str = "ConnectError";

/// Bound for leaving a session.
const LEAVE_TIMEOUT: Duration = Duration::from_secs(1);

/// The two ways of carrying Engine.IO packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

impl TransportKind {
    /// Value of the `transport` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Polling => "polling",
        }
    }

    fn transport_type(self) -> TransportType {
        match self {
            TransportKind::WebSocket => TransportType::Websocket,
            TransportKind::Polling => TransportType::Polling,
        }
    }
}

/// What the client reported, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Signal {
    /// The namespace accepted the connection.
    Connected,
    /// The server closed the namespace.
    Closed,
    /// The client hit an error (rejection, transport failure).
    Error(String),
    /// A server-pushed event.
    Event(WireEvent),
}

/// A joined namespace.
pub(crate) struct Session {
    pub client: Client,
    pub kind: TransportKind,
    pub signals: mpsc::UnboundedReceiver<Signal>,
}

impl Session {
    /// Leave the namespace and close the transport.
    pub async fn leave(&self) {
        release(&self.client).await;
    }
}

async fn release(client: &Client) {
    match tokio::time::timeout(LEAVE_TIMEOUT, client.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "error while leaving dashboard namespace"),
        Err(_) => debug!("leaving dashboard namespace timed out"),
    }
}

/// Join the namespace over the first transport that works.
///
/// Transports are tried in `options.transports` order. Each attempt, from
/// the Engine.IO handshake to the namespace acknowledgement, is bounded by
/// `options.timeout`. A rejection is returned at once; otherwise the last
/// failure is returned when no transport succeeds.
pub(crate) async fn connect(
    target: &ChannelTarget,
    options: &ChannelOptions,
) -> Result<Session, ChannelError> {
    let mut last_error = ChannelError::NoTransport;

    for kind in &options.transports {
        match attempt(target, options, *kind).await {
            Ok(session) => return Ok(session),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(transport = kind.as_str(), error = %e, "transport failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

async fn attempt(
    target: &ChannelTarget,
    options: &ChannelOptions,
    kind: TransportKind,
) -> Result<Session, ChannelError> {
    let deadline = Instant::now() + options.timeout;
    let (tx, mut signals) = mpsc::unbounded_channel();

    debug!(transport = kind.as_str(), "opening dashboard transport");
    let client = match tokio::time::timeout_at(deadline, builder(target, options, kind, tx).connect())
        .await
    {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => return Err(ChannelError::SocketIo(target.scrub(&e.to_string()))),
        Err(_) => return Err(ChannelError::Timeout(options.timeout)),
    };

    match tokio::time::timeout_at(deadline, await_ack(target, &mut signals)).await {
        Ok(Ok(())) => Ok(Session {
            client,
            kind,
            signals,
        }),
        Ok(Err(e)) => {
            release(&client).await;
            Err(e)
        }
        Err(_) => {
            release(&client).await;
            Err(ChannelError::Timeout(options.timeout))
        }
    }
}

fn builder(
    target: &ChannelTarget,
    options: &ChannelOptions,
    kind: TransportKind,
    tx: mpsc::UnboundedSender<Signal>,
) -> ClientBuilder {
    let on_connect = tx.clone();
    let on_close = tx.clone();
    let on_error = tx.clone();
    let on_any = tx;

    ClientBuilder::new(target.socket_url(&options.path).as_str())
        .namespace(target.namespace())
        .transport_type(kind.transport_type())
        // Retries belong to the manager.
        .reconnect(false)
        .on(Event::Connect, move |_: Payload, _: Client| {
            let _ = on_connect.send(Signal::Connected);
            async {}.boxed()
        })
        .on(Event::Close, move |_: Payload, _: Client| {
            let _ = on_close.send(Signal::Closed);
            async {}.boxed()
        })
        .on(Event::Error, move |payload: Payload, _: Client| {
            let _ = on_error.send(Signal::Error(payload_text(payload)));
            async {}.boxed()
        })
        .on_any(move |event: Event, payload: Payload, _: Client| {
            if let Some(wire) = wire_event(event, payload) {
                let _ = on_any.send(Signal::Event(wire));
            }
            async {}.boxed()
        })
}

/// Wait for the namespace to accept or refuse the connection.
async fn await_ack(
    target: &ChannelTarget,
    signals: &mut mpsc::UnboundedReceiver<Signal>,
) -> Result<(), ChannelError> {
    while let Some(signal) = signals.recv().await {
        match signal {
            Signal::Connected => return Ok(()),
            Signal::Error(text) if text.contains(CONNECT_ERROR_MARK) => {
                return Err(ChannelError::Rejected(rejection_message(&text)))
            }
            Signal::Error(text) => return Err(ChannelError::Transport(target.scrub(&text))),
            Signal::Closed => return Err(ChannelError::Closed),
            Signal::Event(_) => {}
        }
    }
    Err(ChannelError::Closed)
}

/// A custom event as a [`WireEvent`]. Binary payloads are not supported.
fn wire_event(event: Event, payload: Payload) -> Option<WireEvent> {
    let name = match event {
        Event::Custom(name) => name,
        Event::Message => "message".to_string(),
        _ => return None,
    };
    match payload {
        Payload::Text(args) => Some(WireEvent::new(name, args)),
        _ => {
            warn!(event = %name, "dropping non-JSON event payload");
            None
        }
    }
}

fn payload_text(payload: Payload) -> String {
    match payload {
        Payload::Text(values) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// `{"message": ..}` from a CONNECT_ERROR frame, or the raw text.
fn rejection_message(text: &str) -> String {
    text.find('{')
        .and_then(|start| serde_json::from_str::<ErrorPayload>(&text[start..]).ok())
        .map(|p| p.message)
        .unwrap_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use futures_util::{SinkExt, StreamExt};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    const OPEN: &str = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    fn options(transports: Vec<TransportKind>, timeout: Duration) -> ChannelOptions {
        ChannelOptions {
            transports,
            timeout,
            ..ChannelOptions::default()
        }
    }

    fn target(port: u16) -> ChannelTarget {
        ChannelTarget::new(&format!("http://127.0.0.1:{}/api", port), "tok").unwrap()
    }

    struct Request {
        line: String,
        upgrade: bool,
    }

    /// Read one HTTP/1.1 request head and body.
    async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Request> {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let mut length = 0usize;
        let mut upgrade = false;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).await.ok()? == 0 {
                return None;
            }
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            let lower = header.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                length = value.trim().parse().unwrap_or(0);
            }
            if lower.starts_with("upgrade:") {
                upgrade = true;
            }
        }
        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await.ok()?;
        Some(Request {
            line: line.trim_end().to_string(),
            upgrade,
        })
    }

    async fn respond(reader: &mut BufReader<TcpStream>, status: &str, body: &str) {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Length: {}\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let _ = reader.get_mut().write_all(response.as_bytes()).await;
    }

    /// Engine.IO polling server that refuses WebSocket upgrades.
    ///
    /// Each GET with a session id takes the next frame from `frames`; once
    /// they run out the poll is held open.
    async fn serve_polling(listener: TcpListener, frames: Vec<String>) {
        let frames = Arc::new(Mutex::new(VecDeque::from(frames)));
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let frames = frames.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);
                while let Some(request) = read_request(&mut reader).await {
                    if request.upgrade || request.line.contains("transport=websocket") {
                        respond(&mut reader, "400 Bad Request", "").await;
                        return;
                    }
                    if request.line.starts_with("POST") {
                        respond(&mut reader, "200 OK", "ok").await;
                    } else if !request.line.contains("sid=") {
                        respond(&mut reader, "200 OK", OPEN).await;
                    } else {
                        let next = frames.lock().pop_front();
                        match next {
                            Some(frame) => respond(&mut reader, "200 OK", &frame).await,
                            None => std::future::pending::<()>().await,
                        }
                    }
                }
            });
        }
    }

    #[tokio::test]
    async fn test_no_transports_configured() {
        let result = connect(&target(1), &options(vec![], Duration::from_secs(1))).await;
        assert!(matches!(result, Err(ChannelError::NoTransport)));
    }

    #[tokio::test]
    async fn test_refused_port_fails_every_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect(
            &target(port),
            &options(
                vec![TransportKind::WebSocket, TransportKind::Polling],
                Duration::from_secs(2),
            ),
        )
        .await;
        let err = result.err().expect("nothing listens on the port");
        assert!(!err.is_fatal());
        assert!(!err.to_string().contains("token=tok"));
    }

    #[tokio::test]
    async fn test_falls_back_to_polling() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let frames = vec![
            r#"40/api/dashboard,{"sid":"s1"}"#.to_string(),
            r#"42/api/dashboard,["dashboard:update",{"users":[{"concepto":"Activos","cantidad":"3"}],"improvementData":[]}]"#
                .to_string(),
        ];
        let server = tokio::spawn(serve_polling(listener, frames));

        let mut session = connect(
            &target(port),
            &options(
                vec![TransportKind::WebSocket, TransportKind::Polling],
                Duration::from_secs(5),
            ),
        )
        .await
        .unwrap();
        assert_eq!(session.kind, TransportKind::Polling);

        let update = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match session.signals.recv().await {
                    Some(Signal::Event(wire)) => break wire,
                    Some(_) => continue,
                    None => panic!("signals ended"),
                }
            }
        })
        .await
        .expect("no update over polling");
        assert_eq!(update.name, "dashboard:update");
        assert_eq!(update.args[0]["users"][0]["cantidad"], "3");

        server.abort();
    }

    #[tokio::test]
    async fn test_unacknowledged_join_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(OPEN)).await.unwrap();
            // Swallow the namespace join and never answer it.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let started = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            connect(
                &target(port),
                &options(vec![TransportKind::WebSocket], Duration::from_millis(300)),
            ),
        )
        .await
        .expect("attempt was not bounded by its timeout");

        assert!(matches!(result, Err(ChannelError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
        server.abort();
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(
            rejection_message(r#"Received an ConnectError frame: {"message":"invalid token"}"#),
            "invalid token"
        );
        assert_eq!(rejection_message("plain"), "plain");
    }

    #[test]
    fn test_wire_event_keeps_custom_events_only() {
        let wire = wire_event(
            Event::Custom("dashboard:error".to_string()),
            Payload::Text(vec![json!({"message": "db down"})]),
        )
        .unwrap();
        assert_eq!(wire.name, "dashboard:error");
        assert_eq!(wire.args[0]["message"], "db down");

        assert!(wire_event(Event::Connect, Payload::Text(vec![])).is_none());
    }
}
