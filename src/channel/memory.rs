//! In-memory channel for embedding and tests.
//!
//! Events pushed through a [`MemoryHandle`] are delivered to whoever binds
//! the channel, exactly as a network channel would deliver them. Calls made
//! on the channel are counted so callers can assert on them.
//!
//! ```
//! use kaizen_pulse::channel::{Channel, MemoryChannel, WireEvent};
//!
//! let (handle, channel) = MemoryChannel::create("dashboard");
//! let mut events = channel.take_events().unwrap();
//!
//! handle.emit(WireEvent::connect());
//! assert_eq!(events.try_recv().unwrap().name, "connect");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Channel, ChannelFactory, WireEvent};
use crate::error::ChannelError;

#[derive(Debug, Default)]
struct Calls {
    connect: AtomicUsize,
    disconnect: AtomicUsize,
    close: AtomicUsize,
}

/// A channel whose events come from a [`MemoryHandle`].
#[derive(Debug)]
pub struct MemoryChannel {
    description: String,
    events: Mutex<Option<mpsc::UnboundedReceiver<WireEvent>>>,
    calls: Arc<Calls>,
}

/// Sending side of a [`MemoryChannel`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    events: mpsc::UnboundedSender<WireEvent>,
    calls: Arc<Calls>,
}

impl MemoryChannel {
    /// Create a channel and the handle that feeds it.
    pub fn create(description: impl Into<String>) -> (MemoryHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Calls::default());
        let handle = MemoryHandle {
            events: tx,
            calls: calls.clone(),
        };
        let channel = Self {
            description: description.into(),
            events: Mutex::new(Some(rx)),
            calls,
        };
        (handle, channel)
    }
}

impl Channel for MemoryChannel {
    fn connect(&self) {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.calls.disconnect.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<WireEvent>> {
        self.events.lock().take()
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl MemoryHandle {
    /// Deliver an event. Returns false once the receiver is gone.
    pub fn emit(&self, event: WireEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Times `connect()` was called on the channel.
    pub fn connects(&self) -> usize {
        self.calls.connect.load(Ordering::SeqCst)
    }

    /// Times `disconnect()` was called on the channel.
    pub fn disconnects(&self) -> usize {
        self.calls.disconnect.load(Ordering::SeqCst)
    }

    /// Times `close()` was called on the channel.
    pub fn closes(&self) -> usize {
        self.calls.close.load(Ordering::SeqCst)
    }
}

/// Factory producing [`MemoryChannel`]s and keeping their handles.
#[derive(Debug, Default)]
pub struct MemoryChannelFactory {
    created: Mutex<Vec<(String, String, MemoryHandle)>>,
}

impl MemoryChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels created so far.
    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    /// Handle of the most recently created channel.
    pub fn last(&self) -> Option<MemoryHandle> {
        self.created.lock().last().map(|(_, _, handle)| handle.clone())
    }

    /// Endpoint and credential of the most recently created channel.
    pub fn last_args(&self) -> Option<(String, String)> {
        self.created
            .lock()
            .last()
            .map(|(endpoint, credential, _)| (endpoint.clone(), credential.clone()))
    }
}

impl ChannelFactory for MemoryChannelFactory {
    fn create(&self, endpoint: &str, credential: &str) -> Result<Arc<dyn Channel>, ChannelError> {
        if endpoint.trim().is_empty() {
            return Err(ChannelError::MissingEndpoint);
        }
        let (handle, channel) = MemoryChannel::create(format!("memory {}", endpoint));
        self.created
            .lock()
            .push((endpoint.to_string(), credential.to_string(), handle));
        Ok(Arc::new(channel))
    }
}
