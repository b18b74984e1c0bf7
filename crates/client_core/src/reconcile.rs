//! Request/response calls against the reporting service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::UserId,
    error::ApiError,
    protocol::{Report, NEW_REPORT_ROUTE, REPORTS_ROUTE},
};
use tracing::{info, warn};
use url::Url;

use crate::error::ClientError;

/// Reconciliation seam used by [`crate::session::ReportSession`].
///
/// The `fetch`/`request` calls surface a tagged result; the provided
/// `list_reports`/`create_report` wrappers degrade failures to empty/absent
/// values for callers that only want to keep rendering.
#[async_trait]
pub trait ReportsApi: Send + Sync {
    async fn fetch_reports(&self, user_id: &UserId) -> Result<Vec<Report>, ClientError>;

    /// Allocates a new report on every successful call; do not retry blindly.
    async fn request_new_report(&self, user_id: &UserId) -> Result<Report, ClientError>;

    async fn list_reports(&self, user_id: &UserId) -> Vec<Report> {
        match self.fetch_reports(user_id).await {
            Ok(reports) => reports,
            Err(error) => {
                warn!(%user_id, %error, "listing reports failed; using empty list");
                Vec::new()
            }
        }
    }

    async fn create_report(&self, user_id: &UserId) -> Option<Report> {
        match self.request_new_report(user_id).await {
            Ok(report) => Some(report),
            Err(error) => {
                warn!(%user_id, %error, "creating report failed");
                None
            }
        }
    }
}

pub struct MissingReportsApi;

#[async_trait]
impl ReportsApi for MissingReportsApi {
    async fn fetch_reports(&self, _user_id: &UserId) -> Result<Vec<Report>, ClientError> {
        Err(ClientError::Unavailable("reports api is not configured".into()))
    }

    async fn request_new_report(&self, _user_id: &UserId) -> Result<Report, ClientError> {
        Err(ClientError::Unavailable("reports api is not configured".into()))
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationClient {
    http: Client,
    endpoint: String,
    request_timeout: Duration,
}

impl ReconciliationClient {
    pub fn new(http: Client, endpoint: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            request_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        url: Url,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        let response = check_status(&url, response).await?;
        response.json().await.map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ReportsApi for ReconciliationClient {
    async fn fetch_reports(&self, user_id: &UserId) -> Result<Vec<Report>, ClientError> {
        let url = user_url(&self.endpoint, REPORTS_ROUTE, user_id)?;
        let reports: Vec<Report> = self.send_json(url.clone(), self.http.get(url)).await?;
        info!(%user_id, count = reports.len(), "listed reports");
        Ok(reports)
    }

    async fn request_new_report(&self, user_id: &UserId) -> Result<Report, ClientError> {
        let url = user_url(&self.endpoint, NEW_REPORT_ROUTE, user_id)?;
        let report: Report = self.send_json(url.clone(), self.http.post(url)).await?;
        info!(%user_id, report_id = %report.report_id, "created report");
        Ok(report)
    }
}

/// `<endpoint><route>?user_id=<id>`, with the id percent-encoded. Any query
/// already on the endpoint is kept ahead of `user_id`.
pub fn user_url(endpoint: &str, route: &str, user_id: &UserId) -> Result<Url, ClientError> {
    let invalid = |source| ClientError::InvalidEndpoint {
        url: endpoint.to_string(),
        source,
    };
    let mut url = Url::parse(endpoint).map_err(invalid)?;
    url.path_segments_mut()
        .map_err(|()| invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(route.split('/').filter(|segment| !segment.is_empty()));
    url.set_fragment(None);
    url.query_pairs_mut().append_pair("user_id", user_id.as_str());
    Ok(url)
}

pub(crate) async fn check_status(url: &Url, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let api_error = response.json::<ApiError>().await.ok();
    Err(ClientError::Status {
        url: url.to_string(),
        status,
        api_error,
    })
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
