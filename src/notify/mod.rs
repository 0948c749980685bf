pub mod audio;
pub mod dispatcher;
pub mod persistence;
pub mod sanitize;

pub const ALERT_SOUND_EVENT: &str = "alerts_sound";
