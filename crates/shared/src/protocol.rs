use serde::{Deserialize, Serialize};

use crate::domain::{ReportId, ReportStatus, UserId};

/// Name of the push-channel event carrying a [`ReportStatusUpdate`] payload.
pub const REPORT_STATUS_UPDATE_EVENT: &str = "report_status_update";

pub const REPORTS_ROUTE: &str = "/reports";
pub const NEW_REPORT_ROUTE: &str = "/new/report";
pub const REPORT_ROUTE: &str = "/report";
pub const SSE_ROUTE: &str = "/sse";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub user_id: UserId,
    pub report_id: ReportId,
    pub report_status: ReportStatus,
}

impl Report {
    pub fn new(
        user_id: impl Into<UserId>,
        report_id: impl Into<ReportId>,
        report_status: ReportStatus,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            report_id: report_id.into(),
            report_status,
        }
    }

    /// Copy of this report with a different status.
    pub fn with_status(&self, report_status: ReportStatus) -> Self {
        Self {
            user_id: self.user_id.clone(),
            report_id: self.report_id.clone(),
            report_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatusUpdate {
    pub id: ReportId,
    pub status: ReportStatus,
    /// Optional per-report sequence number. Services that stamp updates let
    /// clients discard ones delivered out of order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl ReportStatusUpdate {
    pub fn new(id: impl Into<ReportId>, status: ReportStatus) -> Self {
        Self {
            id: id.into(),
            status,
            seq: None,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuery {
    pub user_id: UserId,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
