use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STREAM_PATH: &str = "/ws/prices";
pub const DEFAULT_BROADCAST_PATH: &str = "/ws/broadcast";
pub const COLLECTOR_PATH: &str = "/api/errors";
pub const DEFAULT_ERROR_DEDUP_WINDOW_MS: u64 = 10_000;
pub const MIN_ERROR_DEDUP_WINDOW_MS: u64 = 100;
pub const MAX_ERROR_DEDUP_WINDOW_MS: u64 = 600_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_DB_FILENAME: &str = "alertdesk.db";

const API_BASE_URL_VAR: &str = "ALERTDESK_API_BASE_URL";
const STREAM_URL_VAR: &str = "ALERTDESK_STREAM_URL";
const BROADCAST_URL_VAR: &str = "ALERTDESK_BROADCAST_URL";
const COLLECTOR_URL_VAR: &str = "ALERTDESK_COLLECTOR_URL";
const ERROR_DEDUP_WINDOW_VAR: &str = "ALERTDESK_ERROR_DEDUP_WINDOW_MS";
const LOG_LEVEL_VAR: &str = "ALERTDESK_LOG_LEVEL";
const DB_FILENAME_VAR: &str = "APP_DB_FILENAME";

#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub api_base_url: String,
    pub stream_url: String,
    pub broadcast_url: String,
    /// `None` disables error delivery entirely.
    pub collector_url: Option<String>,
    pub error_dedup_window: Duration,
    pub log_level: String,
    pub db_filename: String,
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_base_url = read(API_BASE_URL_VAR)
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let stream_url = read(STREAM_URL_VAR)
            .unwrap_or_else(|| websocket_url(&api_base_url, DEFAULT_STREAM_PATH));
        let broadcast_url = read(BROADCAST_URL_VAR)
            .unwrap_or_else(|| websocket_url(&api_base_url, DEFAULT_BROADCAST_PATH));

        // An explicitly empty collector variable disables delivery; unset falls back to the API host.
        let collector_url = match lookup(COLLECTOR_URL_VAR) {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => Some(format!("{api_base_url}{COLLECTOR_PATH}")),
        };

        let error_dedup_window_ms = read(ERROR_DEDUP_WINDOW_VAR)
            .and_then(|value| value.parse::<u64>().ok())
            .map(|value| value.clamp(MIN_ERROR_DEDUP_WINDOW_MS, MAX_ERROR_DEDUP_WINDOW_MS))
            .unwrap_or(DEFAULT_ERROR_DEDUP_WINDOW_MS);

        let log_level = read(LOG_LEVEL_VAR).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let db_filename = read(DB_FILENAME_VAR).unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string());

        Self {
            api_base_url,
            stream_url,
            broadcast_url,
            collector_url,
            error_dedup_window: Duration::from_millis(error_dedup_window_ms),
            log_level,
            db_filename,
        }
    }
}

fn websocket_url(api_base_url: &str, path: &str) -> String {
    let base = if let Some(rest) = api_base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_base_url.to_string()
    };
    format!("{base}{path}")
}
