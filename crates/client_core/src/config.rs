use std::{collections::HashMap, fs, path::Path, time::Duration};

use crate::error::ClientError;

pub const DEFAULT_SETTINGS_FILE: &str = "report_client.toml";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base endpoint of the reporting service, e.g. `http://localhost:3000/v4`.
    pub server_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000/v4".into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientSettings {
    /// HTTP client for both request/response calls and the push channel.
    ///
    /// Only the connect timeout is set globally; the push channel is a
    /// long-lived response, so request timeouts are applied per call.
    pub fn http_client(&self) -> Result<reqwest::Client, ClientError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(ClientError::HttpClient)
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_overrides(&mut settings, |key| file_cfg.get(key).cloned()),
            Err(error) => tracing::warn!(
                path = %path.display(),
                %error,
                "ignoring unreadable client settings file"
            ),
        }
    }

    apply_env_overrides(&mut settings);
    settings
}

fn apply_env_overrides(settings: &mut ClientSettings) {
    if let Ok(v) = std::env::var("REPORTS_SERVER_URL") {
        settings.server_url = normalize_server_url(&v);
    }
    apply_overrides(settings, |key| {
        std::env::var(format!("APP__{}", key.to_ascii_uppercase())).ok()
    });
}

fn apply_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("server_url") {
        settings.server_url = normalize_server_url(&v);
    }
    if let Some(secs) = lookup("request_timeout_secs").and_then(|v| v.parse::<u64>().ok()) {
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = lookup("connect_timeout_secs").and_then(|v| v.parse::<u64>().ok()) {
        settings.connect_timeout = Duration::from_secs(secs);
    }
}

/// Trims whitespace and trailing slashes so route paths can be appended directly.
pub fn normalize_server_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return ClientSettings::default().server_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
