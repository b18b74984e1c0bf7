//! One user's live view of their reports.

use std::sync::Arc;

use reqwest::Client;
use shared::{
    domain::UserId,
    protocol::{Report, ReportStatusUpdate},
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    config::ClientSettings,
    error::ClientError,
    reconcile::{ReconciliationClient, ReportsApi},
    registry::{Registry, ReportList},
    subscriber::{ChannelState, PushSubscriber},
};

/// Owns the registry and the push channel for a single login.
///
/// Starting a session populates the registry from the service, then opens the
/// push channel with a listener that merges updates into it. Closing or
/// dropping the session closes the channel.
pub struct ReportSession {
    user_id: UserId,
    api: Arc<dyn ReportsApi>,
    registry: Arc<Registry>,
    subscriber: PushSubscriber,
}

impl ReportSession {
    pub async fn connect(settings: &ClientSettings, user_id: UserId) -> Result<Self, ClientError> {
        let http = settings.http_client()?;
        let api = Arc::new(ReconciliationClient::new(
            http.clone(),
            settings.server_url.clone(),
            settings.request_timeout,
        ));
        Ok(Self::start(api, &http, settings, user_id).await)
    }

    /// Backend failures degrade: a failed list leaves the registry empty and a
    /// push channel that cannot open, or does not answer within
    /// `settings.request_timeout`, starts out `ClosedByError`.
    pub async fn start(
        api: Arc<dyn ReportsApi>,
        http: &Client,
        settings: &ClientSettings,
        user_id: UserId,
    ) -> Self {
        let endpoint = settings.server_url.as_str();
        let registry = Arc::new(Registry::new());
        registry.replace_all(api.list_reports(&user_id).await);

        let listener_registry = Arc::clone(&registry);
        let listener = move |update: ReportStatusUpdate| {
            listener_registry.apply_update(&update);
        };
        let opened = PushSubscriber::open_within(
            http,
            endpoint,
            user_id.clone(),
            settings.request_timeout,
            listener,
        )
        .await;
        let subscriber = match opened {
            Ok(subscriber) => subscriber,
            Err(error) => {
                warn!(%user_id, %error, "push channel failed to open");
                PushSubscriber::failed(endpoint, user_id.clone())
            }
        };

        info!(%user_id, reports = registry.len(), "report session started");
        Self {
            user_id,
            api,
            registry,
            subscriber,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn reports(&self) -> ReportList {
        self.registry.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportList> {
        self.registry.subscribe()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn channel_state(&self) -> ChannelState {
        self.subscriber.state()
    }

    pub fn watch_channel_state(&self) -> watch::Receiver<ChannelState> {
        self.subscriber.watch_state()
    }

    /// Creates a report and appends it to the registry. `None` on any failure.
    pub async fn create_report(&self) -> Option<Report> {
        let report = self.api.create_report(&self.user_id).await?;
        self.registry.append(report.clone());
        Some(report)
    }

    /// Like [`ReportSession::create_report`] but keeps the failure.
    pub async fn try_create_report(&self) -> Result<Report, ClientError> {
        let report = self.api.request_new_report(&self.user_id).await?;
        self.registry.append(report.clone());
        Ok(report)
    }

    pub fn close(&self) {
        self.subscriber.close();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
