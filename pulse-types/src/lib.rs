//! # pulse-types
//!
//! Wire types for the KaizenPro real-time dashboard channel. The dashboard
//! server pushes a complete [`MetricSnapshot`] on every `dashboard:update`
//! event and an [`ErrorPayload`] on every `dashboard:error` event; this crate
//! defines both so that producers and consumers agree on one schema.
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde, using the server's field names
//!   (`concepto`, `cantidad`, `improvementData`)
//!
//! ## Example
//!
//! ```rust
//! use pulse_types::MetricSnapshot;
//!
//! let snapshot = MetricSnapshot::builder()
//!     .user("Total", "12")
//!     .user("Active", "9")
//!     .improvement("Open plans", "4")
//!     .build();
//!
//! assert_eq!(snapshot.users.len(), 2);
//! assert_eq!(snapshot.len(), 3);
//! ```

mod metric;
mod payload;
mod snapshot;

pub use metric::*;
pub use payload::*;
pub use snapshot::*;
