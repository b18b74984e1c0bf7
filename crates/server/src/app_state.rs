use std::time::Duration;

use crate::api::ReportStore;
use shared::{domain::UserId, protocol::ReportStatusUpdate};
use tokio::sync::broadcast;

/// A status update addressed to one user's push channels.
#[derive(Debug, Clone)]
pub(crate) struct UserEvent {
    pub(crate) user_id: UserId,
    pub(crate) update: ReportStatusUpdate,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: ReportStore,
    pub(crate) events: broadcast::Sender<UserEvent>,
    pub(crate) keep_alive: Duration,
}
