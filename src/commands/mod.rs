pub mod alerts;
pub mod errors;
pub mod health;
pub mod notifications;
pub mod price_feeds;
pub mod sound_settings;

use crate::error::AppError;

const MAX_INSTANCE_ID_CHARS: usize = 64;

pub(crate) fn normalize_instance_id(raw: &str, field: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let valid = !trimmed.is_empty()
        && trimmed.chars().count() <= MAX_INSTANCE_ID_CHARS
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.'));
    if !valid {
        return Err(AppError::InvalidArgument(format!(
            "{field} must be 1-{MAX_INSTANCE_ID_CHARS} characters of [A-Za-z0-9-_:.]"
        )));
    }
    Ok(trimmed.to_string())
}
