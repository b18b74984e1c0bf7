use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ReportId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Queued,
    Processing,
    Canceled,
    Failed,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportStatusError {
    #[error("unknown report status `{0}`")]
    InvalidStatus(String),
    #[error("report cannot move from {} to {}", current.as_str(), next_status.as_str())]
    InvalidStatusTransition {
        current: ReportStatus,
        next_status: ReportStatus,
    },
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 6] = [
        ReportStatus::Pending,
        ReportStatus::Queued,
        ReportStatus::Processing,
        ReportStatus::Canceled,
        ReportStatus::Failed,
        ReportStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Queued => "queued",
            ReportStatus::Processing => "processing",
            ReportStatus::Canceled => "canceled",
            ReportStatus::Failed => "failed",
            ReportStatus::Completed => "completed",
        }
    }

    /// Completed reports never move again; failed and canceled ones can be retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed)
    }

    /// Service-side lifecycle rules. Clients accept whatever the service pushes
    /// and never call this.
    pub fn transition(self, next_status: ReportStatus) -> Result<Self, ReportStatusError> {
        match (self, next_status) {
            (Self::Pending, Self::Queued | Self::Canceled)
            | (Self::Queued, Self::Processing | Self::Canceled)
            | (Self::Processing, Self::Failed | Self::Completed)
            | (Self::Canceled | Self::Failed, Self::Pending) => Ok(next_status),
            _ => Err(ReportStatusError::InvalidStatusTransition {
                current: self,
                next_status,
            }),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = ReportStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "pending" | "PENDING" => ReportStatus::Pending,
            "queued" | "QUEUED" => ReportStatus::Queued,
            "processing" | "PROCESSING" => ReportStatus::Processing,
            "canceled" | "CANCELED" => ReportStatus::Canceled,
            "failed" | "FAILED" => ReportStatus::Failed,
            "completed" | "COMPLETED" => ReportStatus::Completed,
            _ => return Err(ReportStatusError::InvalidStatus(s.to_owned())),
        };
        Ok(status)
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
