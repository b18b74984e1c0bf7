//! Server-to-client push channel for report status updates.

use std::{fmt::Display, sync::Arc, time::Duration};

use futures::{Stream, StreamExt};
use reqwest::{
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    Client,
};
use shared::{
    domain::UserId,
    protocol::{ReportStatusUpdate, REPORT_STATUS_UPDATE_EVENT, SSE_ROUTE},
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    reconcile::{check_status, user_url},
    sse::{SseDecoder, SseEvent},
};

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// How long [`PushSubscriber::open`] waits for the response head.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    ClosedByError,
    ClosedByCaller,
}

impl ChannelState {
    pub fn is_closed(&self) -> bool {
        !matches!(self, ChannelState::Open)
    }
}

/// Receives every decoded status update, one at a time, in delivery order.
pub trait StatusUpdateListener: Send + 'static {
    fn on_status_update(&mut self, update: ReportStatusUpdate);
}

impl<F> StatusUpdateListener for F
where
    F: FnMut(ReportStatusUpdate) + Send + 'static,
{
    fn on_status_update(&mut self, update: ReportStatusUpdate) {
        self(update)
    }
}

/// One user's push channel.
///
/// The listener is fixed at construction. Closing is terminal: after an
/// error or [`PushSubscriber::close`] a new subscriber must be opened.
/// Dropping the subscriber closes it.
pub struct PushSubscriber {
    url: String,
    user_id: UserId,
    state: Arc<watch::Sender<ChannelState>>,
    reader: Option<JoinHandle<()>>,
}

impl PushSubscriber {
    pub async fn open<L>(
        http: &Client,
        endpoint: &str,
        user_id: UserId,
        listener: L,
    ) -> Result<Self, ClientError>
    where
        L: StatusUpdateListener,
    {
        Self::open_within(http, endpoint, user_id, DEFAULT_OPEN_TIMEOUT, listener).await
    }

    /// Opens the channel, giving up with [`ClientError::Timeout`] if the
    /// response head has not arrived within `open_timeout`. The stream itself
    /// is unbounded once open.
    pub async fn open_within<L>(
        http: &Client,
        endpoint: &str,
        user_id: UserId,
        open_timeout: Duration,
        listener: L,
    ) -> Result<Self, ClientError>
    where
        L: StatusUpdateListener,
    {
        let url = user_url(endpoint, SSE_ROUTE, &user_id)?;
        let request = http
            .get(url.clone())
            .header(ACCEPT, EVENT_STREAM_MIME)
            .header(CACHE_CONTROL, "no-cache");
        let handshake = async {
            let response = request
                .send()
                .await
                .map_err(|source| ClientError::Transport {
                    url: url.to_string(),
                    source,
                })?;
            check_status(&url, response).await
        };
        let response = tokio::time::timeout(open_timeout, handshake)
            .await
            .map_err(|_| ClientError::Timeout {
                url: url.to_string(),
                after: open_timeout,
            })??;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(EVENT_STREAM_MIME) {
            return Err(ClientError::NotAnEventStream {
                url: url.to_string(),
                content_type,
            });
        }

        let (state, _) = watch::channel(ChannelState::Open);
        let state = Arc::new(state);
        let reader = tokio::spawn(read_events(
            response.bytes_stream(),
            listener,
            Arc::clone(&state),
            user_id.clone(),
        ));
        info!(%user_id, %url, "push channel open");

        Ok(Self {
            url: url.to_string(),
            user_id,
            state,
            reader: Some(reader),
        })
    }

    /// A subscriber whose channel never opened.
    pub fn failed(endpoint: &str, user_id: UserId) -> Self {
        let (state, _) = watch::channel(ChannelState::ClosedByError);
        Self {
            url: format!("{}{SSE_ROUTE}", endpoint.trim_end_matches('/')),
            user_id,
            state: Arc::new(state),
            reader: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn close(&self) {
        if close_with(&self.state, ChannelState::ClosedByCaller) {
            info!(user_id = %self.user_id, "push channel closed by caller");
        }
        if let Some(reader) = &self.reader {
            reader.abort();
        }
    }
}

impl Drop for PushSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

/// Moves an open channel into `terminal`. Returns false if it was already closed.
fn close_with(state: &watch::Sender<ChannelState>, terminal: ChannelState) -> bool {
    state.send_if_modified(|current| {
        if current.is_closed() {
            return false;
        }
        *current = terminal;
        true
    })
}

pub(crate) async fn read_events<S, B, E, L>(
    stream: S,
    mut listener: L,
    state: Arc<watch::Sender<ChannelState>>,
    user_id: UserId,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    L: StatusUpdateListener,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = SseDecoder::new();

    let reason = loop {
        match stream.next().await {
            Some(Ok(chunk)) => {
                for event in decoder.feed(chunk.as_ref()) {
                    if state.borrow().is_closed() {
                        return;
                    }
                    dispatch_event(&event, &mut listener, &user_id);
                }
            }
            Some(Err(err)) => break format!("receive failed: {err}"),
            None => break "stream ended by server".to_string(),
        }
    };

    if close_with(&state, ChannelState::ClosedByError) {
        warn!(%user_id, %reason, "push channel closed");
    }
}

fn dispatch_event<L: StatusUpdateListener>(event: &SseEvent, listener: &mut L, user_id: &UserId) {
    if event.event != REPORT_STATUS_UPDATE_EVENT {
        debug!(%user_id, event = %event.event, "ignoring push event");
        return;
    }
    match serde_json::from_str::<ReportStatusUpdate>(&event.data) {
        Ok(update) => {
            debug!(
                %user_id,
                report_id = %update.id,
                status = %update.status,
                "status update received"
            );
            listener.on_status_update(update);
        }
        Err(error) => warn!(
            %user_id,
            %error,
            data = %event.data,
            "dropping malformed status update"
        ),
    }
}

#[cfg(test)]
#[path = "tests/subscriber_tests.rs"]
mod tests;
