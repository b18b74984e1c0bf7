//! Client-side core for tracking a user's asynchronously processed reports.
//!
//! A [`ReportSession`] fetches the user's reports once, then keeps the
//! [`Registry`] current from the service's push channel. Request/response calls
//! live in [`reconcile`], the push channel in [`subscriber`], and the pure
//! update step in [`registry::merge`].

pub mod config;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod session;
pub mod sse;
pub mod subscriber;

pub use config::{load_settings, ClientSettings};
pub use error::ClientError;
pub use reconcile::{MissingReportsApi, ReconciliationClient, ReportsApi};
pub use registry::{merge, MergeOutcome, Registry, ReportList};
pub use session::ReportSession;
pub use subscriber::{ChannelState, PushSubscriber, StatusUpdateListener};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
