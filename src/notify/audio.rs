use serde::{Deserialize, Serialize};

pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SoundType {
    Default,
    Silent,
    Chime,
    Bell,
    Ping,
    Alarm,
}

impl SoundType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Silent => "silent",
            Self::Chime => "chime",
            Self::Bell => "bell",
            Self::Ping => "ping",
            Self::Alarm => "alarm",
        }
    }

    /// Unknown names decode as `Default` so a bad row never breaks dispatch.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "silent" | "none" => Self::Silent,
            "chime" => Self::Chime,
            "bell" => Self::Bell,
            "ping" => Self::Ping,
            "alarm" => Self::Alarm,
            _ => Self::Default,
        }
    }
}

impl From<String> for SoundType {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertSoundSettings {
    pub enabled: bool,
    pub volume: u8,
    pub default_sound: SoundType,
    pub mute_when_focused: bool,
    pub updated_at_ms: i64,
}

pub const DEFAULT_SOUND_ENABLED: bool = true;
pub const DEFAULT_VOLUME: u8 = 70;
pub const DEFAULT_SOUND: SoundType = SoundType::Chime;
pub const DEFAULT_MUTE_WHEN_FOCUSED: bool = false;

impl Default for AlertSoundSettings {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_SOUND_ENABLED,
            volume: DEFAULT_VOLUME,
            default_sound: DEFAULT_SOUND,
            mute_when_focused: DEFAULT_MUTE_WHEN_FOCUSED,
            updated_at_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioCue {
    pub alert_id: Option<u64>,
    pub sound: SoundType,
    pub gain: f64,
}

pub fn volume_to_gain(volume: u8) -> f64 {
    f64::from(volume.min(MAX_VOLUME)) / 100.0
}

pub fn resolve_audio_cue(
    alert_id: Option<u64>,
    alert_sound: SoundType,
    settings: &AlertSoundSettings,
    window_focused: bool,
) -> Option<AudioCue> {
    if !settings.enabled {
        return None;
    }
    if settings.mute_when_focused && window_focused {
        return None;
    }

    let sound = match alert_sound {
        SoundType::Default => settings.default_sound,
        explicit => explicit,
    };
    // A settings row whose default is itself `default` still needs an audible sound.
    let sound = if sound == SoundType::Default {
        DEFAULT_SOUND
    } else {
        sound
    };
    if sound == SoundType::Silent {
        return None;
    }

    Some(AudioCue {
        alert_id,
        sound,
        gain: volume_to_gain(settings.volume),
    })
}
