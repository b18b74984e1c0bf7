use std::{collections::HashMap, fs, path::Path, time::Duration};

pub const DEFAULT_SETTINGS_FILE: &str = "server.toml";

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub keep_alive_secs: u64,
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            keep_alive_secs: 30,
            event_buffer: 100,
        }
    }
}

impl Settings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("keep_alive_secs").and_then(|v| v.parse().ok()) {
                settings.keep_alive_secs = v;
            }
            if let Some(v) = file_cfg.get("event_buffer").and_then(|v| v.parse().ok()) {
                settings.event_buffer = v;
            }
        }
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("APP__KEEP_ALIVE_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.keep_alive_secs = parsed;
        }
    }

    if let Ok(v) = std::env::var("APP__EVENT_BUFFER") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.event_buffer = parsed.max(1);
        }
    }

    settings.event_buffer = settings.event_buffer.max(1);
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
