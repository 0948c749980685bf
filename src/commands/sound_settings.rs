use crate::error::AppError;
use crate::notify::audio::AlertSoundSettings;
use crate::notify::persistence::{save_alert_sound_settings, SaveAlertSoundSettingsArgs};
use crate::state::AppState;
use tauri::State;
use tracing::info;

#[tauri::command]
pub async fn alert_sound_settings_get(
    state: State<'_, AppState>,
) -> Result<AlertSoundSettings, AppError> {
    Ok(state.alerts.sound_settings.read().clone())
}

#[tauri::command]
pub async fn alert_sound_settings_save(
    state: State<'_, AppState>,
    args: SaveAlertSoundSettingsArgs,
) -> Result<AlertSoundSettings, AppError> {
    let saved = save_alert_sound_settings(&state.db_pool, args).await?;
    *state.alerts.sound_settings.write() = saved.clone();
    info!(
        enabled = saved.enabled,
        volume = saved.volume,
        default_sound = saved.default_sound.as_str(),
        "alert sound settings saved"
    );
    Ok(saved)
}
