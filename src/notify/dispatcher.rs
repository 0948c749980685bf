use crate::error::AppError;
use crate::notify::audio::{resolve_audio_cue, AlertSoundSettings, AudioCue, SoundType};
use crate::notify::sanitize::{NativeNotification, NotificationRequest};
use crate::notify::ALERT_SOUND_EVENT;
use crate::telemetry::forwarder::ErrorForwarder;
use crate::telemetry::record::Severity;
use serde::Serialize;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_notification::NotificationExt;
use tracing::{debug, warn};

pub const MAIN_WINDOW_LABEL: &str = "main";
const NOTIFICATION_ERROR_TYPE: &str = "NotificationError";
const SOUND_ERROR_TYPE: &str = "AlertSoundError";

pub fn emit_to_main<S: Serialize + Clone>(
    app: &AppHandle,
    event: &str,
    payload: S,
) -> Result<(), AppError> {
    let window = app
        .get_webview_window(MAIN_WINDOW_LABEL)
        .ok_or_else(|| AppError::WindowNotFound(MAIN_WINDOW_LABEL.to_string()))?;
    window.emit(event, payload)?;
    Ok(())
}

pub trait AlertSurface: Send + Sync {
    fn show_notification(&self, notification: &NativeNotification) -> Result<(), AppError>;
    fn play_sound(&self, cue: &AudioCue) -> Result<(), AppError>;
    fn is_focused(&self) -> bool;
}

pub struct TauriAlertSurface {
    app: AppHandle,
}

impl TauriAlertSurface {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl AlertSurface for TauriAlertSurface {
    fn show_notification(&self, notification: &NativeNotification) -> Result<(), AppError> {
        // Never `.silent()`: the OS notification sound always plays.
        self.app
            .notification()
            .builder()
            .title(notification.title.as_str())
            .body(notification.body.as_str())
            .show()
            .map_err(|error| AppError::Notification(error.to_string()))
    }

    fn play_sound(&self, cue: &AudioCue) -> Result<(), AppError> {
        emit_to_main(&self.app, ALERT_SOUND_EVENT, cue)
    }

    fn is_focused(&self) -> bool {
        self.app
            .get_webview_window(MAIN_WINDOW_LABEL)
            .and_then(|window| window.is_focused().ok())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotifyResult {
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub sound: Option<AudioCue>,
    pub notified: bool,
}

pub struct NotificationDispatcher {
    surface: Arc<dyn AlertSurface>,
    forwarder: Arc<ErrorForwarder>,
}

impl NotificationDispatcher {
    pub fn new(surface: Arc<dyn AlertSurface>, forwarder: Arc<ErrorForwarder>) -> Self {
        Self { surface, forwarder }
    }

    pub fn notify(&self, request: &NotificationRequest) -> NotifyResult {
        let native = NativeNotification::from(request.sanitize());

        match self.surface.show_notification(&native) {
            Ok(()) => NotifyResult { delivered: true },
            Err(error) => {
                warn!(%error, "native notification failed");
                self.forwarder
                    .report_host(Severity::Error, NOTIFICATION_ERROR_TYPE, error.to_string());
                NotifyResult { delivered: false }
            }
        }
    }

    pub fn play(
        &self,
        alert_id: Option<u64>,
        sound_type: SoundType,
        settings: &AlertSoundSettings,
    ) -> Option<AudioCue> {
        let cue = resolve_audio_cue(alert_id, sound_type, settings, self.surface.is_focused())?;

        match self.surface.play_sound(&cue) {
            Ok(()) => Some(cue),
            Err(error) => {
                warn!(%error, "alert sound playback failed");
                self.forwarder
                    .report_host(Severity::Error, SOUND_ERROR_TYPE, error.to_string());
                None
            }
        }
    }

    pub fn dispatch(
        &self,
        alert_id: Option<u64>,
        request: &NotificationRequest,
        settings: &AlertSoundSettings,
    ) -> DispatchReport {
        let sound = self.play(alert_id, request.sound_type, settings);
        let notified = self.notify(request).delivered;
        debug!(?alert_id, played = sound.is_some(), notified, "dispatched alert trigger");
        DispatchReport { sound, notified }
    }
}
