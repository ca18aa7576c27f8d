//! Socket.IO channel and its connection manager task.
//!
//! [`SocketChannel`] is a thin handle: every operation is a message to a
//! manager task that owns the Socket.IO client. The task is spawned lazily
//! on the first `connect()`, so creating a channel performs no I/O.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::transport::{self, Session, Signal};
use super::{reason, Channel, ChannelOptions, ChannelTarget, WireEvent};
use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
    Close,
}

/// A channel to the dashboard namespace over Socket.IO.
pub struct SocketChannel {
    description: String,
    commands: mpsc::UnboundedSender<Command>,
    events: Mutex<Option<mpsc::UnboundedReceiver<WireEvent>>>,
    /// Manager waiting for its first `connect()`.
    pending: Mutex<Option<Manager>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketChannel {
    pub fn new(target: ChannelTarget, options: ChannelOptions) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let description = format!("socket.io {}", target.redacted());

        let manager = Manager {
            target,
            options,
            commands: command_rx,
            events: event_tx,
        };

        Self {
            description,
            commands: command_tx,
            events: Mutex::new(Some(event_rx)),
            pending: Mutex::new(Some(manager)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the manager if it has not been started yet.
    ///
    /// Returns false when no Tokio runtime is available.
    fn ensure_started(&self) -> bool {
        let mut pending = self.pending.lock();
        let Some(manager) = pending.take() else {
            return true;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                *self.task.lock() = Some(handle.spawn(manager.run()));
                true
            }
            Err(_) => {
                error!("cannot start dashboard channel outside of a Tokio runtime");
                manager.emit(WireEvent::connect_error(&ChannelError::NoRuntime.to_string()));
                *pending = Some(manager);
                false
            }
        }
    }
}

impl fmt::Debug for SocketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketChannel")
            .field("description", &self.description)
            .field("started", &self.pending.lock().is_none())
            .finish()
    }
}

impl Channel for SocketChannel {
    fn connect(&self) {
        if self.ensure_started() {
            let _ = self.commands.send(Command::Connect);
        }
    }

    fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
        self.pending.lock().take();
        self.task.lock().take();
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<WireEvent>> {
        self.events.lock().take()
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// What the manager does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connect,
    Retry,
}

/// Owns the client and runs the connect / retry state machine.
struct Manager {
    target: ChannelTarget,
    options: ChannelOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<WireEvent>,
}

impl Manager {
    fn emit(&self, event: WireEvent) {
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }

    async fn run(mut self) {
        let mut phase = Phase::Idle;
        // Automatic retries since the last successful connect.
        let mut attempt: u32 = 0;

        loop {
            match phase {
                Phase::Idle => match self.commands.recv().await {
                    Some(Command::Connect) => {
                        attempt = 0;
                        phase = Phase::Connect;
                    }
                    Some(Command::Disconnect) => {}
                    Some(Command::Close) | None => return,
                },

                Phase::Connect => {
                    let result = {
                        let establishing = transport::connect(&self.target, &self.options);
                        tokio::pin!(establishing);

                        loop {
                            tokio::select! {
                                result = &mut establishing => break Some(result),
                                command = self.commands.recv() => match command {
                                    Some(Command::Connect) => continue,
                                    Some(Command::Disconnect) => break None,
                                    Some(Command::Close) | None => return,
                                },
                            }
                        }
                    };

                    phase = match result {
                        None => {
                            debug!("connect abandoned by disconnect");
                            Phase::Idle
                        }
                        Some(Ok(mut session)) => {
                            if attempt > 0 {
                                self.emit(WireEvent::reconnect(attempt));
                            }
                            attempt = 0;
                            info!(
                                transport = session.kind.as_str(),
                                "dashboard channel connected"
                            );
                            self.emit(WireEvent::connect());

                            let Some(ended) = self.pump(&mut session).await else {
                                debug!("dashboard channel closed");
                                return;
                            };
                            info!(reason = ended, "dashboard channel disconnected");
                            self.emit(WireEvent::disconnect(ended));

                            match ended {
                                reason::SERVER_DISCONNECT | reason::CLIENT_DISCONNECT => Phase::Idle,
                                _ => Phase::Retry,
                            }
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, attempt, "dashboard channel handshake failed");
                            self.emit(WireEvent::connect_error(&err.to_string()));
                            if err.is_fatal() {
                                Phase::Idle
                            } else {
                                Phase::Retry
                            }
                        }
                    };
                }

                Phase::Retry => {
                    if !self.options.reconnection {
                        phase = Phase::Idle;
                        continue;
                    }
                    if attempt >= self.options.reconnection_attempts {
                        warn!(attempts = attempt, "giving up on dashboard channel");
                        self.emit(WireEvent::reconnect_failed());
                        attempt = 0;
                        phase = Phase::Idle;
                        continue;
                    }

                    let delay = tokio::time::sleep(self.options.reconnection_delay);
                    tokio::pin!(delay);

                    let proceed = loop {
                        tokio::select! {
                            _ = &mut delay => break true,
                            command = self.commands.recv() => match command {
                                Some(Command::Connect) => continue,
                                Some(Command::Disconnect) => break false,
                                Some(Command::Close) | None => return,
                            },
                        }
                    };

                    if proceed {
                        attempt += 1;
                        debug!(attempt, "reconnecting dashboard channel");
                        self.emit(WireEvent::reconnect_attempt(attempt));
                        phase = Phase::Connect;
                    } else {
                        attempt = 0;
                        phase = Phase::Idle;
                    }
                }
            }
        }
    }

    /// Drive a live session until it ends.
    ///
    /// Returns the disconnect reason, or `None` when the channel was closed.
    /// The client reads the transport on its own task; only the signal
    /// queue is polled here, and dropping a pending `recv` loses nothing.
    async fn pump(&mut self, session: &mut Session) -> Option<&'static str> {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {}
                    Some(Command::Disconnect) => {
                        session.leave().await;
                        return Some(reason::CLIENT_DISCONNECT);
                    }
                    Some(Command::Close) | None => {
                        session.leave().await;
                        return None;
                    }
                },
                signal = session.signals.recv() => match signal {
                    Some(Signal::Event(wire)) => {
                        debug!(event = %wire.name, "event received");
                        self.emit(wire);
                    }
                    Some(Signal::Connected) => trace!("duplicate namespace acknowledgement"),
                    Some(Signal::Closed) => {
                        session.leave().await;
                        return Some(reason::SERVER_DISCONNECT);
                    }
                    Some(Signal::Error(text)) => {
                        warn!(error = %self.target.scrub(&text), "dashboard transport failed");
                        session.leave().await;
                        return Some(reason::TRANSPORT_ERROR);
                    }
                    None => return Some(reason::TRANSPORT_CLOSE),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    use crate::channel::TransportKind;

    const OPEN: &str = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    fn options() -> ChannelOptions {
        ChannelOptions {
            transports: vec![TransportKind::WebSocket],
            reconnection_attempts: 2,
            reconnection_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
            ..ChannelOptions::default()
        }
    }

    fn update_frame(value: &str) -> String {
        let payload = json!(["dashboard:update", {"users": [{"concepto": "Activos", "cantidad": value}]}]);
        format!("42/api/dashboard,{}", payload)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<WireEvent>) -> WireEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    /// Accept one WebSocket client, join it, then play `script`.
    async fn serve_once(listener: TcpListener, script: Vec<String>) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(OPEN)).await.unwrap();

        let join = ws.next().await.unwrap().unwrap();
        assert!(join.to_text().unwrap().starts_with("40/api/dashboard"));
        ws.send(Message::text(r#"40/api/dashboard,{"sid":"s1"}"#))
            .await
            .unwrap();

        for frame in script {
            ws.send(Message::text(frame)).await.unwrap();
        }
        // Keep the socket open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    }

    #[tokio::test]
    async fn test_session_delivers_events_and_server_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let script = vec![
            "2".to_string(),
            update_frame("3"),
            "41/api/dashboard,".to_string(),
        ];
        let server = tokio::spawn(serve_once(listener, script));

        let target = ChannelTarget::new(&format!("http://127.0.0.1:{}/api", port), "tok").unwrap();
        let channel = SocketChannel::new(target, options());
        let mut events = channel.take_events().unwrap();
        assert!(channel.take_events().is_none());

        channel.connect();

        assert_eq!(next_event(&mut events).await, WireEvent::connect());
        let update = next_event(&mut events).await;
        assert_eq!(update.name, "dashboard:update");
        assert_eq!(update.args[0]["users"][0]["cantidad"], "3");
        assert_eq!(
            next_event(&mut events).await,
            WireEvent::disconnect(reason::SERVER_DISCONNECT)
        );

        // A server disconnect is not retried.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());

        channel.close();
        server.abort();
    }

    #[tokio::test]
    async fn test_connect_during_session_keeps_every_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(OPEN)).await.unwrap();
            let _join = ws.next().await;
            ws.send(Message::text(r#"40/api/dashboard,{"sid":"s1"}"#))
                .await
                .unwrap();
            for i in 0..20 {
                ws.send(Message::text(update_frame(&i.to_string())))
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            while let Some(Ok(_)) = ws.next().await {}
        });

        let target = ChannelTarget::new(&format!("http://127.0.0.1:{}/api", port), "tok").unwrap();
        let channel = SocketChannel::new(target, options());
        let mut events = channel.take_events().unwrap();
        channel.connect();
        assert_eq!(next_event(&mut events).await, WireEvent::connect());

        let mut values = Vec::new();
        while values.len() < 20 {
            // Ignored while live, but must not disturb delivery.
            channel.connect();
            let event = next_event(&mut events).await;
            assert_eq!(event.name, "dashboard:update");
            values.push(event.args[0]["users"][0]["cantidad"].as_str().unwrap().to_string());
        }
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(values, expected);

        channel.close();
        server.abort();
    }

    #[tokio::test]
    async fn test_unanswered_join_reports_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    ws.send(Message::text(OPEN)).await.unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        let target = ChannelTarget::new(&format!("http://127.0.0.1:{}/api", port), "tok").unwrap();
        let channel = SocketChannel::new(
            target,
            ChannelOptions {
                timeout: Duration::from_millis(300),
                ..options()
            },
        );
        let mut events = channel.take_events().unwrap();
        channel.connect();

        let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
            .await
            .expect("attempt never gave up")
            .unwrap();
        assert_eq!(event.name, "connect_error");
        assert!(event.args[0]["message"].as_str().unwrap().contains("timed out"));

        channel.close();
        server.abort();
    }

    #[tokio::test]
    async fn test_rejected_handshake_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::text(OPEN)).await.unwrap();
            let _join = ws.next().await;
            ws.send(Message::text(r#"44/api/dashboard,{"message":"invalid token"}"#))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let target = ChannelTarget::new(&format!("http://127.0.0.1:{}/api", port), "bad").unwrap();
        let channel = SocketChannel::new(target, options());
        let mut events = channel.take_events().unwrap();
        channel.connect();

        let event = next_event(&mut events).await;
        assert_eq!(event.name, "connect_error");
        assert!(event.args[0]["message"].as_str().unwrap().contains("invalid token"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());

        channel.close();
        server.abort();
    }

    #[tokio::test]
    async fn test_retries_exhaust_then_report_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = ChannelTarget::new(&format!("http://127.0.0.1:{}/api", port), "tok").unwrap();
        let channel = SocketChannel::new(target, options());
        let mut events = channel.take_events().unwrap();
        channel.connect();

        let mut names = Vec::new();
        loop {
            let event = next_event(&mut events).await;
            let done = event.name == "reconnect_failed";
            names.push(match event.name.as_str() {
                "reconnect_attempt" => format!("reconnect_attempt:{}", event.args[0]),
                other => other.to_string(),
            });
            if done {
                break;
            }
        }

        assert_eq!(
            names,
            vec![
                "connect_error",
                "reconnect_attempt:1",
                "connect_error",
                "reconnect_attempt:2",
                "connect_error",
                "reconnect_failed",
            ]
        );

        channel.close();
    }

    #[tokio::test]
    async fn test_connect_is_lazy_and_close_is_idempotent() {
        let target = ChannelTarget::new("http://127.0.0.1:1/api", "tok").unwrap();
        let channel = SocketChannel::new(target, options());
        assert!(channel.task.lock().is_none());
        channel.close();
        channel.close();
        channel.disconnect();
    }

    #[test]
    fn test_connect_without_runtime_reports_error() {
        let target = ChannelTarget::new("http://127.0.0.1:1/api", "tok").unwrap();
        let channel = SocketChannel::new(target, options());
        let mut events = channel.take_events().unwrap();

        channel.connect();

        let event = events.try_recv().unwrap();
        assert_eq!(event.name, "connect_error");
        assert!(channel.task.lock().is_none());
    }
}
