use crate::boundary::{coerce_to_js_string, truncate_chars};
use crate::notify::audio::SoundType;
use serde_json::Value;

pub const MAX_TITLE_CHARS: usize = 20;
pub const MAX_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub title_raw: Option<Value>,
    pub body_raw: Option<Value>,
    pub sound_type: SoundType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedNotification {
    pub title: String,
    pub body: String,
}

impl NotificationRequest {
    pub fn from_text(title: impl Into<String>, body: impl Into<String>, sound_type: SoundType) -> Self {
        Self {
            title_raw: Some(Value::String(title.into())),
            body_raw: Some(Value::String(body.into())),
            sound_type,
        }
    }

    pub fn from_payload(payload: &Value) -> Self {
        let sound_type = payload
            .get("soundType")
            .and_then(Value::as_str)
            .map(SoundType::parse_lenient)
            .unwrap_or(SoundType::Default);

        Self {
            title_raw: payload.get("title").cloned(),
            body_raw: payload.get("body").cloned(),
            sound_type,
        }
    }

    pub fn sanitize(&self) -> SanitizedNotification {
        SanitizedNotification {
            title: sanitize_title(self.title_raw.as_ref()),
            body: sanitize_body(self.body_raw.as_ref()),
        }
    }
}

pub fn sanitize_title(raw: Option<&Value>) -> String {
    truncate_chars(&coerce_to_js_string(raw), MAX_TITLE_CHARS)
}

pub fn sanitize_body(raw: Option<&Value>) -> String {
    truncate_chars(&coerce_to_js_string(raw), MAX_BODY_CHARS)
}

/// The only value handed to the native notification API. It has no `silent`
/// flag, so nothing a caller sends can mute the system sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeNotification {
    pub title: String,
    pub body: String,
}

impl From<SanitizedNotification> for NativeNotification {
    fn from(value: SanitizedNotification) -> Self {
        Self {
            title: value.title,
            body: value.body,
        }
    }
}
