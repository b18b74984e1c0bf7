use std::time::Duration;

use reqwest::StatusCode;
use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("invalid endpoint url `{url}`: {source}")]
    InvalidEndpoint {
        url: String,
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} answered {status}{}", api_error_suffix(.api_error))]
    Status {
        url: String,
        status: StatusCode,
        api_error: Option<ApiError>,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} did not answer within {after:?}")]
    Timeout { url: String, after: Duration },
    #[error("reporting service unavailable: {0}")]
    Unavailable(String),
    #[error("push channel at {url} is not an event stream (content-type `{content_type}`)")]
    NotAnEventStream { url: String, content_type: String },
}

fn api_error_suffix(api_error: &Option<ApiError>) -> String {
    match api_error {
        Some(err) => format!(" ({err})"),
        None => String::new(),
    }
}

impl ClientError {
    /// Status code of a non-2xx reply, if that is what this error is.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }
}
