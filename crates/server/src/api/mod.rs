use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{
    domain::{ReportId, ReportStatus, UserId},
    error::{ApiError, ErrorCode},
    protocol::{Report, ReportStatusUpdate},
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory report records keyed by owner.
#[derive(Clone, Default)]
pub struct ReportStore {
    reports: Arc<RwLock<HashMap<UserId, Vec<Report>>>>,
    next_seq: Arc<AtomicU64>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self, user_id: &UserId) -> Vec<Report> {
        self.reports
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn create(&self, user_id: &UserId) -> Report {
        let report = Report::new(
            user_id.clone(),
            Uuid::new_v4().to_string(),
            ReportStatus::Pending,
        );
        self.reports
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .push(report.clone());
        report
    }

    /// Moves a report along its lifecycle and returns the update to publish,
    /// stamped with a sequence number.
    pub async fn change_status(
        &self,
        user_id: &UserId,
        report_id: &ReportId,
        next_status: ReportStatus,
    ) -> Result<ReportStatusUpdate, ApiError> {
        let mut guard = self.reports.write().await;
        let report = guard
            .get_mut(user_id)
            .and_then(|reports| reports.iter_mut().find(|r| &r.report_id == report_id))
            .ok_or_else(|| {
                ApiError::new(
                    ErrorCode::NotFound,
                    format!("report {report_id} not found for user {user_id}"),
                )
            })?;

        report.report_status = report
            .report_status
            .transition(next_status)
            .map_err(|e| ApiError::new(ErrorCode::Conflict, e.to_string()))?;

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(ReportStatusUpdate::new(report_id.clone(), next_status).with_seq(seq))
    }
}

/// User ids on the wire are UUIDs; anything else is rejected before it reaches the store.
pub fn parse_user_id(raw: &UserId) -> Result<UserId, ApiError> {
    Uuid::parse_str(raw.as_str())
        .map(|uuid| UserId::new(uuid.hyphenated().to_string()))
        .map_err(|_| {
            ApiError::new(
                ErrorCode::Validation,
                format!("user_id `{raw}` is not a valid UUID"),
            )
        })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
