//! Connection state controller.
//!
//! The controller owns one dashboard channel for the lifetime of a view. It
//! reads the credential, asks the factory for a channel, binds to its events
//! and feeds each event through [`DashboardView::apply`]. The resulting view
//! is published on a `watch` channel so the UI can re-render on change.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kaizen_pulse::channel::{MemoryChannelFactory, WireEvent};
//! use kaizen_pulse::{Controller, StaticCredential};
//!
//! # tokio_test::block_on(async {
//! let factory = Arc::new(MemoryChannelFactory::new());
//! let controller = Controller::mount(
//!     "http://localhost:3001/api/v1/kaizenpro",
//!     Arc::new(StaticCredential::new("token")),
//!     factory.clone(),
//! );
//! assert!(controller.view().is_connecting());
//!
//! factory.last().unwrap().emit(WireEvent::connect());
//! let mut view = controller.subscribe();
//! view.wait_for(|v| v.is_connected()).await.unwrap();
//! # });
//! ```

mod state;

pub use state::{
    reduce, ConnectionError, ConnectionState, DashboardView, Directive, ErrorKind,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::binder::{self, Binding};
use crate::channel::{Channel, ChannelFactory};
use crate::credential::CredentialSource;
use crate::error::ChannelError;

/// State shared between the controller and its pump task.
struct Shared {
    view: watch::Sender<DashboardView>,
    unmounted: AtomicBool,
    channel: Mutex<Option<Arc<dyn Channel>>>,
}

impl Shared {
    /// Mutate the view unless unmounted. Returns false once unmounted.
    ///
    /// The flag is checked under the watch lock, so no mutation can land
    /// after [`Controller::unmount`] returns.
    fn mutate(&self, f: impl FnOnce(&mut DashboardView) -> bool) -> bool {
        let mut live = true;
        self.view.send_if_modified(|view| {
            if self.unmounted.load(Ordering::SeqCst) {
                live = false;
                return false;
            }
            f(view)
        });
        live
    }

    fn fail(&self, error: ConnectionError) {
        warn!(kind = ?error.kind, message = %error.message, "dashboard connection failed");
        self.mutate(|view| {
            view.fail(error);
            true
        });
    }
}

/// Drives the dashboard connection for one mounted view.
pub struct Controller {
    endpoint: String,
    credentials: Arc<dyn CredentialSource>,
    factory: Arc<dyn ChannelFactory>,
    shared: Arc<Shared>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// Mount: read the credential and start connecting.
    ///
    /// Never fails. A missing credential or a configuration problem leaves
    /// the view in `Errored`; in the first case the factory is not called.
    pub fn mount(
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
        factory: Arc<dyn ChannelFactory>,
    ) -> Self {
        let (view, _) = watch::channel(DashboardView::default());
        let controller = Self {
            endpoint: endpoint.into(),
            credentials,
            factory,
            shared: Arc::new(Shared {
                view,
                unmounted: AtomicBool::new(false),
                channel: Mutex::new(None),
            }),
            pump: Mutex::new(None),
        };
        controller.attach();
        controller
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> DashboardView {
        self.shared.view.borrow().clone()
    }

    /// Receiver that observes every change to the view.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.shared.view.subscribe()
    }

    /// Description of the current channel, if one exists.
    pub fn channel_description(&self) -> Option<String> {
        self.shared
            .channel
            .lock()
            .as_ref()
            .map(|c| c.description().to_string())
    }

    /// Ask for a new connection.
    ///
    /// Only acts from `Disconnected` or `Errored`. Reuses the current
    /// channel, or builds a new one when mounting never produced one.
    pub fn reconnect(&self) {
        let mut started = false;
        self.shared.mutate(|view| {
            started = view.begin_connect();
            started
        });
        if !started {
            debug!("reconnect ignored, connection already live");
            return;
        }

        let channel = self.shared.channel.lock().clone();
        match channel {
            Some(channel) => {
                info!("reconnecting dashboard channel");
                channel.connect();
            }
            None => self.attach(),
        }
    }

    /// Close the current session. The channel is kept for `reconnect`.
    pub fn disconnect(&self) {
        if !self.shared.mutate(DashboardView::mark_disconnected) {
            return;
        }
        if let Some(channel) = self.shared.channel.lock().as_ref() {
            info!("disconnecting dashboard channel");
            channel.disconnect();
        }
    }

    /// Tear down for good. Later events are ignored. Idempotent.
    pub fn unmount(&self) {
        let mut first = false;
        self.shared.view.send_if_modified(|_| {
            first = !self.shared.unmounted.swap(true, Ordering::SeqCst);
            false
        });
        if !first {
            return;
        }

        if let Some(task) = self.pump.lock().take() {
            task.abort();
        }
        if let Some(channel) = self.shared.channel.lock().take() {
            channel.close();
        }
        info!("dashboard controller unmounted");
    }

    pub fn is_unmounted(&self) -> bool {
        self.shared.unmounted.load(Ordering::SeqCst)
    }

    /// Read the credential, create and bind a channel, and connect it.
    fn attach(&self) {
        let Some(token) = self.credentials.credential() else {
            self.shared.fail(ConnectionError::not_authenticated());
            return;
        };

        let channel = match self.factory.create(&self.endpoint, &token) {
            Ok(channel) => channel,
            Err(e) => {
                self.shared.fail(ConnectionError::configuration(e));
                return;
            }
        };

        let binding = match binder::bind(channel.as_ref()) {
            Ok(binding) => binding,
            Err(e) => {
                channel.close();
                self.shared.fail(ConnectionError::configuration(e));
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            channel.close();
            self.shared
                .fail(ConnectionError::configuration(ChannelError::NoRuntime));
            return;
        };

        let live = self.shared.mutate(|view| {
            view.connection_state = ConnectionState::Connecting;
            true
        });
        if !live {
            channel.close();
            return;
        }

        *self.shared.channel.lock() = Some(channel.clone());
        let task = runtime.spawn(pump(self.shared.clone(), channel.clone(), binding));
        *self.pump.lock() = Some(task);

        info!(channel = channel.description(), "connecting dashboard channel");
        channel.connect();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("endpoint", &self.endpoint)
            .field("view", &*self.shared.view.borrow())
            .field("unmounted", &self.is_unmounted())
            .finish()
    }
}

/// Apply events to the view one at a time, in delivery order.
async fn pump(shared: Arc<Shared>, channel: Arc<dyn Channel>, mut binding: Binding) {
    while let Some(event) = binding.next().await {
        debug!(event = event.name(), "dashboard event");

        let mut directive = None;
        let live = shared.mutate(|view| {
            directive = view.apply(event);
            true
        });
        if !live {
            break;
        }

        if let Some(Directive::RequestConnect) = directive {
            // Published on its own so subscribers see `Disconnected` first.
            if !shared.mutate(DashboardView::begin_connect) {
                break;
            }
            info!("server closed the dashboard channel, requesting connect");
            channel.connect();
        }
    }
    debug!("dashboard event pump stopped");
}
