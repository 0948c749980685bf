use crate::error::AppError;
use crate::notify::audio::{
    AlertSoundSettings, SoundType, DEFAULT_MUTE_WHEN_FOCUSED, DEFAULT_SOUND,
    DEFAULT_SOUND_ENABLED, DEFAULT_VOLUME, MAX_VOLUME,
};
use crate::poll::now_unix_ms;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

fn bool_to_sqlite(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn sqlite_to_bool(value: i64) -> bool {
    value != 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAlertSoundSettingsArgs {
    pub enabled: bool,
    pub volume: i64,
    pub default_sound: String,
    pub mute_when_focused: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSoundSettings {
    pub enabled: bool,
    pub volume: u8,
    pub default_sound: SoundType,
    pub mute_when_focused: bool,
}

impl SaveAlertSoundSettingsArgs {
    pub fn normalize(self) -> Result<NormalizedSoundSettings, AppError> {
        let volume = u8::try_from(self.volume)
            .ok()
            .filter(|volume| *volume <= MAX_VOLUME)
            .ok_or_else(|| {
                AppError::InvalidArgument(format!("volume must be between 0 and {MAX_VOLUME}"))
            })?;

        let default_sound = SoundType::parse_lenient(&self.default_sound);
        if default_sound == SoundType::Default {
            return Err(AppError::InvalidArgument(format!(
                "defaultSound '{}' must name a concrete sound",
                self.default_sound
            )));
        }

        Ok(NormalizedSoundSettings {
            enabled: self.enabled,
            volume,
            default_sound,
            mute_when_focused: self.mute_when_focused,
        })
    }
}

fn map_settings_row(row: &sqlx::sqlite::SqliteRow) -> Result<AlertSoundSettings, AppError> {
    let enabled_raw: i64 = row.try_get("enabled")?;
    let volume_raw: i64 = row.try_get("volume")?;
    let default_sound_raw: String = row.try_get("default_sound")?;
    let mute_when_focused_raw: i64 = row.try_get("mute_when_focused")?;
    let updated_at_ms: i64 = row.try_get("updated_at_ms")?;

    Ok(AlertSoundSettings {
        enabled: sqlite_to_bool(enabled_raw),
        volume: volume_raw.clamp(0, i64::from(MAX_VOLUME)) as u8,
        default_sound: SoundType::parse_lenient(&default_sound_raw),
        mute_when_focused: sqlite_to_bool(mute_when_focused_raw),
        updated_at_ms,
    })
}

async fn ensure_sound_settings_seed(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO alert_sound_settings (id, enabled, volume, default_sound, mute_when_focused, updated_at_ms) VALUES (1, ?, ?, ?, ?, ?)",
    )
    .bind(bool_to_sqlite(DEFAULT_SOUND_ENABLED))
    .bind(i64::from(DEFAULT_VOLUME))
    .bind(DEFAULT_SOUND.as_str())
    .bind(bool_to_sqlite(DEFAULT_MUTE_WHEN_FOCUSED))
    .bind(now_unix_ms())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_alert_sound_settings(pool: &SqlitePool) -> Result<AlertSoundSettings, AppError> {
    ensure_sound_settings_seed(pool).await?;

    let row = sqlx::query(
        "SELECT enabled, volume, default_sound, mute_when_focused, updated_at_ms FROM alert_sound_settings WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;

    map_settings_row(&row)
}

pub async fn save_alert_sound_settings(
    pool: &SqlitePool,
    args: SaveAlertSoundSettingsArgs,
) -> Result<AlertSoundSettings, AppError> {
    let normalized = args.normalize()?;

    sqlx::query(
        "INSERT INTO alert_sound_settings (id, enabled, volume, default_sound, mute_when_focused, updated_at_ms) VALUES (1, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET enabled=excluded.enabled, volume=excluded.volume, default_sound=excluded.default_sound, mute_when_focused=excluded.mute_when_focused, updated_at_ms=excluded.updated_at_ms",
    )
    .bind(bool_to_sqlite(normalized.enabled))
    .bind(i64::from(normalized.volume))
    .bind(normalized.default_sound.as_str())
    .bind(bool_to_sqlite(normalized.mute_when_focused))
    .bind(now_unix_ms())
    .execute(pool)
    .await?;

    load_alert_sound_settings(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;

    async fn migrated_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");
        run_migrations(&pool)
            .await
            .expect("migrations should apply");
        pool
    }

    #[tokio::test]
    async fn seeds_defaults_on_first_load() {
        let pool = migrated_pool().await;
        let settings = load_alert_sound_settings(&pool)
            .await
            .expect("settings should load");

        assert_eq!(settings.enabled, DEFAULT_SOUND_ENABLED);
        assert_eq!(settings.volume, DEFAULT_VOLUME);
        assert_eq!(settings.default_sound, DEFAULT_SOUND);
        assert_eq!(settings.mute_when_focused, DEFAULT_MUTE_WHEN_FOCUSED);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let pool = migrated_pool().await;
        let saved = save_alert_sound_settings(
            &pool,
            SaveAlertSoundSettingsArgs {
                enabled: false,
                volume: 35,
                default_sound: "alarm".to_string(),
                mute_when_focused: true,
            },
        )
        .await
        .expect("settings should save");

        let loaded = load_alert_sound_settings(&pool)
            .await
            .expect("settings should load");
        assert_eq!(saved, loaded);
        assert!(!loaded.enabled);
        assert_eq!(loaded.volume, 35);
        assert_eq!(loaded.default_sound, SoundType::Alarm);
        assert!(loaded.mute_when_focused);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let args = SaveAlertSoundSettingsArgs {
            enabled: true,
            volume: 101,
            default_sound: "chime".to_string(),
            mute_when_focused: false,
        };
        assert!(args.normalize().is_err());

        let negative = SaveAlertSoundSettingsArgs {
            enabled: true,
            volume: -1,
            default_sound: "chime".to_string(),
            mute_when_focused: false,
        };
        assert!(negative.normalize().is_err());
    }

    #[test]
    fn rejects_default_as_global_sound() {
        let args = SaveAlertSoundSettingsArgs {
            enabled: true,
            volume: 10,
            default_sound: "default".to_string(),
            mute_when_focused: false,
        };
        assert!(args.normalize().is_err());
    }
}
