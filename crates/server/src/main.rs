//! Reference reporting service: report listing, creation, status changes and
//! a per-user server-sent-event stream of status updates.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures::{future, Stream, StreamExt};
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{
        Report, ReportStatusUpdate, UserQuery, NEW_REPORT_ROUTE, REPORTS_ROUTE, REPORT_ROUTE,
        REPORT_STATUS_UPDATE_EVENT, SSE_ROUTE,
    },
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{parse_user_id, ReportStore};
use app_state::{AppState, UserEvent};
use config::load_settings;

const API_PREFIX: &str = "/v4";
const KEEP_ALIVE_TEXT: &str = "keep-alive-text";

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_env("REPORTS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = load_settings();
    let (events, _) = broadcast::channel(settings.event_buffer);
    let state = AppState {
        store: ReportStore::new(),
        events,
        keep_alive: settings.keep_alive(),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "report service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let reports = Router::new()
        .route(REPORTS_ROUTE, get(http_list_reports))
        .route(NEW_REPORT_ROUTE, post(http_create_report))
        .route(REPORT_ROUTE, put(http_change_report_status))
        .route(SSE_ROUTE, get(sse_handler));

    Router::new()
        .route("/healthz", get(healthz))
        .nest(API_PREFIX, reports)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn user_from_query(q: &UserQuery) -> ApiResult<UserId> {
    parse_user_id(&q.user_id).map_err(|e| (StatusCode::BAD_REQUEST, Json(e)))
}

async fn http_list_reports(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> ApiResult<Json<Vec<Report>>> {
    let user_id = user_from_query(&q)?;
    let reports = state.store.list(&user_id).await;
    info!(%user_id, count = reports.len(), "listed reports");
    Ok(Json(reports))
}

async fn http_create_report(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let user_id = user_from_query(&q)?;
    let report = state.store.create(&user_id).await;
    info!(%user_id, report_id = %report.report_id, "created new report");
    Ok((StatusCode::CREATED, Json(report)))
}

async fn http_change_report_status(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
    Json(update): Json<ReportStatusUpdate>,
) -> ApiResult<StatusCode> {
    let user_id = user_from_query(&q)?;
    let update = state
        .store
        .change_status(&user_id, &update.id, update.status)
        .await
        .map_err(|e| (status_for(e.code), Json(e)))?;

    let receivers = state
        .events
        .send(UserEvent {
            user_id: user_id.clone(),
            update: update.clone(),
        })
        .unwrap_or(0);
    info!(
        %user_id,
        report_id = %update.id,
        status = %update.status,
        receivers,
        "report status changed"
    );
    Ok(StatusCode::ACCEPTED)
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let user_id = user_from_query(&q)?;
    info!(%user_id, "push channel connected");

    let stream = user_event_stream(state.events.subscribe(), user_id);
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keep_alive)
            .text(KEEP_ALIVE_TEXT),
    ))
}

/// Status updates for `user_id` only, encoded as `report_status_update` events.
fn user_event_stream(
    rx: broadcast::Receiver<UserEvent>,
    user_id: UserId,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(move |item| {
        let event = match item {
            Ok(event) if event.user_id == user_id => {
                match serde_json::to_string(&event.update) {
                    Ok(data) => Some(Ok(Event::default()
                        .event(REPORT_STATUS_UPDATE_EVENT)
                        .data(data))),
                    Err(error) => {
                        warn!(user_id = %event.user_id, %error, "failed to encode status update");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(%user_id, skipped, "push channel lagged; status updates skipped");
                None
            }
        };
        future::ready(event)
    })
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
