use crate::boundary::{coerce_to_js_string, truncate_chars};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

pub const MAX_MESSAGE_CHARS: usize = 2_000;
pub const MAX_STACK_CHARS: usize = 16_000;
const DEFAULT_ERROR_TYPE: &str = "Error";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorOrigin {
    RenderProcess,
    HostProcess,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Unknown labels degrade to `Error` rather than being rejected.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "info" | "debug" => Self::Info,
            "warning" | "warn" => Self::Warning,
            "critical" | "fatal" => Self::Critical,
            _ => Self::Error,
        }
    }
}

fn serialize_iso_timestamp<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub source: ErrorOrigin,
    #[serde(serialize_with = "serialize_iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub severity: Severity,
}

impl ErrorRecord {
    pub fn new(
        source: ErrorOrigin,
        session_id: &str,
        severity: Severity,
        error_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: truncate_chars(&message.into(), MAX_MESSAGE_CHARS),
            stack: None,
            source,
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            severity,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(truncate_chars(&stack.into(), MAX_STACK_CHARS));
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn from_render_payload(payload: &Value, session_id: &str, received_at: DateTime<Utc>) -> Self {
        let field = |name: &str| payload.get(name).filter(|value| !value.is_null());

        let error_type = field("type")
            .map(|value| coerce_to_js_string(Some(value)))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ERROR_TYPE.to_string());
        let message = field("message")
            .map(|value| coerce_to_js_string(Some(value)))
            .unwrap_or_default();
        let severity = field("severity")
            .and_then(Value::as_str)
            .map(Severity::parse_lenient)
            .unwrap_or(Severity::Error);
        let timestamp = field("timestamp")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or(received_at);

        let record = Self::new(
            ErrorOrigin::RenderProcess,
            session_id,
            severity,
            error_type,
            message,
        )
        .with_timestamp(timestamp);

        match field("stack").and_then(Value::as_str) {
            Some(stack) => record.with_stack(stack),
            None => record,
        }
    }
}
