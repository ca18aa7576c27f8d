//! # kaizen-pulse
//!
//! A live metrics console and client library for the KaizenPro
//! continuous-improvement dashboard.
//!
//! The dashboard server pushes metric snapshots over a Socket.IO channel on
//! the `/dashboard` namespace. This crate opens that channel, translates its
//! events into a small state machine, and renders the result in a terminal UI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌───────────┐   ┌───────────┐   ┌─────────┐   ┌──────────┐  │
//! │  │  channel  │──▶│  binder   │──▶│controller──▶│  app/ui  │  │
//! │  │ (factory) │   │ (events)  │   │ (state) │   │ (render) │  │
//! │  └─────▲─────┘   └───────────┘   └────┬────┘   └──────────┘  │
//! │        │                              │                      │
//! │        └──────── connect / close ─────┘                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`channel`]**: Builds one channel per endpoint and credential
//!   ([`ChannelFactory`]). [`SocketChannelFactory`] speaks Socket.IO over
//!   WebSocket or HTTP long-polling and owns the retry policy.
//! - **[`binder`]**: Turns the channel's raw events into [`ChannelEvent`]s.
//! - **[`controller`]**: Applies events to a [`DashboardView`] and publishes it.
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The interactive terminal front end.
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Token from the command line
//! kaizen-pulse --api-url http://localhost:3001/api/v1/kaizenpro --token "$JWT"
//!
//! # Token from the session file, first snapshot written to JSON
//! kaizen-pulse --api-url http://localhost:3001/api/v1/kaizenpro --export snapshot.json
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use kaizen_pulse::{Controller, SocketChannelFactory, StaticCredential};
//!
//! # tokio_test::block_on(async {
//! let controller = Controller::mount(
//!     "http://localhost:3001/api/v1/kaizenpro",
//!     Arc::new(StaticCredential::new("jwt")),
//!     Arc::new(SocketChannelFactory::default()),
//! );
//!
//! let mut view = controller.subscribe();
//! while view.changed().await.is_ok() {
//!     let current = view.borrow().clone();
//!     println!("{}", current.connection_state);
//!     if let Some(snapshot) = current.last_snapshot {
//!         println!("{} metrics", snapshot.len());
//!     }
//! }
//! # });
//! ```

pub mod app;
pub mod binder;
pub mod channel;
pub mod config;
pub mod controller;
pub mod credential;
pub mod error;
pub mod events;
pub mod ui;

pub use app::App;
pub use binder::{bind, Binding, ChannelEvent};
pub use channel::{
    Channel, ChannelFactory, ChannelOptions, ChannelTarget, SocketChannelFactory, WireEvent,
};
pub use config::{Overrides, Settings};
pub use controller::{ConnectionError, ConnectionState, Controller, DashboardView, ErrorKind};
pub use credential::{CredentialSource, SessionFile, StaticCredential};
pub use error::ChannelError;
pub use pulse_types::{Metric, MetricSnapshot};
