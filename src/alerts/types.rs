use crate::error::AppError;
use crate::notify::audio::SoundType;
use crate::notify::sanitize::NotificationRequest;
use crate::prices::types::WireNumber;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ALERTS_POLL_INTERVAL_MS: u64 = 30_000;
pub const MIN_ALERTS_POLL_INTERVAL_MS: u64 = 2_000;
pub const MAX_ALERTS_POLL_INTERVAL_MS: u64 = 600_000;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: u64,
    pub symbol: String,
    pub condition_type: String,
    pub threshold: f64,
    pub enabled: bool,
    pub sound_type: SoundType,
    /// `None` while armed. Only the backend ever sets this.
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn condition_label(&self) -> String {
        match self.condition_type.as_str() {
            "price_above" | "above" => format!("rose above {}", self.threshold),
            "price_below" | "below" => format!("fell below {}", self.threshold),
            "percent_change_above" => format!("gained more than {}%", self.threshold),
            "percent_change_below" => format!("lost more than {}%", self.threshold),
            "volume_above" => format!("traded more than {} shares", self.threshold),
            other => format!("{} {}", other.replace('_', " "), self.threshold),
        }
    }

    pub fn notification_request(&self) -> NotificationRequest {
        NotificationRequest::from_text(
            format!("{} Alert", self.symbol),
            format!("{} {}", self.symbol, self.condition_label()),
            self.sound_type,
        )
    }
}

/// Accepts RFC 3339 as well as the `YYYY-MM-DD HH:MM:SS` form some backends emit.
pub fn parse_backend_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")?;
    Ok(naive.and_utc())
}

#[derive(Debug, Deserialize)]
pub struct AlertWire {
    pub id: u64,
    pub symbol: String,
    #[serde(alias = "condition")]
    pub condition_type: String,
    pub threshold: WireNumber,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sound_type: Option<String>,
    #[serde(default)]
    pub triggered_at: Option<String>,
    pub created_at: String,
}

fn default_enabled() -> bool {
    true
}

impl TryFrom<AlertWire> for Alert {
    type Error = AppError;

    fn try_from(value: AlertWire) -> Result<Self, Self::Error> {
        let symbol = value.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(AppError::InvalidArgument(
                "alert symbol must be non-empty".to_string(),
            ));
        }

        let triggered_at = match value.triggered_at.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(parse_backend_timestamp(raw)?),
            _ => None,
        };

        Ok(Self {
            id: value.id,
            symbol,
            condition_type: value.condition_type,
            threshold: value.threshold.to_f64()?,
            enabled: value.enabled,
            sound_type: value
                .sound_type
                .as_deref()
                .map(SoundType::parse_lenient)
                .unwrap_or(SoundType::Default),
            triggered_at,
            created_at: parse_backend_timestamp(&value.created_at)?,
        })
    }
}

pub fn unwrap_data_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

pub fn parse_alert(payload: Value) -> Result<Alert, AppError> {
    let wire: AlertWire = serde_json::from_value(unwrap_data_envelope(payload))?;
    wire.try_into()
}

pub fn parse_alert_list(payload: Value) -> Result<Vec<Alert>, AppError> {
    let rows = match unwrap_data_envelope(payload) {
        Value::Array(rows) => rows,
        other => {
            return Err(AppError::InvalidArgument(format!(
                "alert listing must be an array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut alerts = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<AlertWire>(row)
            .map_err(AppError::from)
            .and_then(Alert::try_from)
        {
            Ok(alert) => alerts.push(alert),
            Err(error) => tracing::debug!(%error, "skipping malformed alert row"),
        }
    }
    Ok(alerts)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartAlertsPanelArgs {
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertsPanelConfig {
    pub poll_interval_ms: u64,
}

impl StartAlertsPanelArgs {
    pub fn normalize(self) -> Result<AlertsPanelConfig, AppError> {
        let poll_interval_ms = self
            .poll_interval_ms
            .unwrap_or(DEFAULT_ALERTS_POLL_INTERVAL_MS);
        if !(MIN_ALERTS_POLL_INTERVAL_MS..=MAX_ALERTS_POLL_INTERVAL_MS).contains(&poll_interval_ms)
        {
            return Err(AppError::InvalidArgument(format!(
                "pollIntervalMs must be between {MIN_ALERTS_POLL_INTERVAL_MS} and {MAX_ALERTS_POLL_INTERVAL_MS}"
            )));
        }
        Ok(AlertsPanelConfig { poll_interval_ms })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertArgs {
    pub symbol: String,
    pub condition_type: String,
    pub threshold: f64,
    pub sound_type: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub symbol: String,
    pub condition_type: String,
    pub threshold: f64,
    pub sound_type: SoundType,
    pub enabled: bool,
}

impl CreateAlertArgs {
    pub fn normalize(self) -> Result<NewAlert, AppError> {
        let symbol = self.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() || !symbol.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(AppError::InvalidArgument(
                "symbol must be non-empty alphanumeric ASCII".to_string(),
            ));
        }

        let condition_type = self.condition_type.trim().to_ascii_lowercase();
        if condition_type.is_empty() {
            return Err(AppError::InvalidArgument(
                "conditionType must be non-empty".to_string(),
            ));
        }

        if !self.threshold.is_finite() {
            return Err(AppError::InvalidArgument(
                "threshold must be finite".to_string(),
            ));
        }

        Ok(NewAlert {
            symbol,
            condition_type,
            threshold: self.threshold,
            sound_type: self
                .sound_type
                .as_deref()
                .map(SoundType::parse_lenient)
                .unwrap_or(SoundType::Default),
            enabled: self.enabled.unwrap_or(true),
        })
    }
}

impl NewAlert {
    pub fn provisional(&self, id: u64, created_at: DateTime<Utc>) -> Alert {
        Alert {
            id,
            symbol: self.symbol.clone(),
            condition_type: self.condition_type.clone(),
            threshold: self.threshold,
            enabled: self.enabled,
            sound_type: self.sound_type,
            triggered_at: None,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertToggleArgs {
    pub id: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDeleteArgs {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDeleteResult {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsPanelSession {
    pub panel_id: String,
    pub running: bool,
    pub poll_interval_ms: u64,
}

impl AlertsPanelSession {
    pub fn from_config(panel_id: &str, config: &AlertsPanelConfig) -> Self {
        Self {
            panel_id: panel_id.to_string(),
            running: true,
            poll_interval_ms: config.poll_interval_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsPanelStopResult {
    pub stopped: bool,
}
