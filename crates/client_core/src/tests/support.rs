use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{future, Stream, StreamExt};
use shared::{
    domain::{ReportStatus, UserId},
    protocol::{Report, ReportStatusUpdate, UserQuery, REPORT_STATUS_UPDATE_EVENT},
};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
};
use tokio_stream::wrappers::BroadcastStream;

const CLOSE_STREAM: &str = "__close__";

#[derive(Clone)]
pub(crate) struct FakeReportService {
    pub reports: Arc<Mutex<Vec<Report>>>,
    pub created: Arc<Mutex<u32>>,
    pub seen_user_ids: Arc<Mutex<Vec<UserId>>>,
    pub fail_with: Option<StatusCode>,
    pub sse_fail_with: Option<StatusCode>,
    events: broadcast::Sender<(String, String)>,
}

impl FakeReportService {
    pub fn new(reports: Vec<Report>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            reports: Arc::new(Mutex::new(reports)),
            created: Arc::new(Mutex::new(0)),
            seen_user_ids: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            sse_fail_with: None,
            events,
        }
    }

    pub fn failing(status: StatusCode) -> Self {
        let mut service = Self::new(Vec::new());
        service.fail_with = Some(status);
        service
    }

    pub fn push_update(&self, update: &ReportStatusUpdate) {
        let data = serde_json::to_string(update).expect("update json");
        self.push_raw(REPORT_STATUS_UPDATE_EVENT, &data);
    }

    pub fn push_raw(&self, event: &str, data: &str) {
        let _ = self.events.send((event.to_string(), data.to_string()));
    }

    pub fn end_streams(&self) {
        self.push_raw(CLOSE_STREAM, "");
    }

    pub fn open_streams(&self) -> usize {
        self.events.receiver_count()
    }

    /// Serves the fake under `/v4` and returns the endpoint base url.
    pub async fn spawn(self) -> String {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().nest(
            "/v4",
            Router::new()
                .route("/reports", get(list_reports))
                .route("/new/report", post(create_report))
                .route("/sse", get(sse))
                .with_state(self),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/v4")
    }
}

async fn list_reports(
    State(service): State<FakeReportService>,
    Query(q): Query<UserQuery>,
) -> Response {
    service.seen_user_ids.lock().await.push(q.user_id.clone());
    if let Some(status) = service.fail_with {
        return (status, "boom").into_response();
    }
    let reports: Vec<Report> = service
        .reports
        .lock()
        .await
        .iter()
        .filter(|r| r.user_id == q.user_id)
        .cloned()
        .collect();
    Json(reports).into_response()
}

async fn create_report(
    State(service): State<FakeReportService>,
    Query(q): Query<UserQuery>,
) -> Response {
    if let Some(status) = service.fail_with {
        return (status, "boom").into_response();
    }
    let mut created = service.created.lock().await;
    *created += 1;
    let report = Report::new(q.user_id, format!("r{}", 100 + *created), ReportStatus::Pending);
    service.reports.lock().await.push(report.clone());
    (StatusCode::CREATED, Json(report)).into_response()
}

async fn sse(State(service): State<FakeReportService>) -> Response {
    if let Some(status) = service.sse_fail_with {
        return status.into_response();
    }
    Sse::new(event_stream(service.events.subscribe())).into_response()
}

fn event_stream(
    rx: broadcast::Receiver<(String, String)>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx)
        .filter_map(|item| future::ready(item.ok()))
        .take_while(|(name, _)| future::ready(name != CLOSE_STREAM))
        .map(|(name, data)| Ok(Event::default().event(name).data(data)))
}

/// An endpoint that accepts connections and reads nothing back: requests to
/// it never get a response head.
pub(crate) async fn silent_endpoint() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}
