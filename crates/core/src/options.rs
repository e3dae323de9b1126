// Options record passed with load and focus/volume requests

use crate::error::Result;
use crate::platform::VolumeChannel;
use serde::{Deserialize, Serialize};

/// Requested kind of audio focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusGain {
    /// Exclusive focus for an unknown duration
    #[default]
    Gain,
    /// Short exclusive use; others pause
    GainTransient,
    /// Short use; others may keep playing at a lowered volume
    GainTransientMayDuck,
    /// Short use; nothing else may play, not even notifications
    GainTransientExclusive,
}

/// Options recognised by the bridge
///
/// Missing keys fall back to their defaults and unknown keys are ignored, so
/// `{}` is always a valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerOptions {
    /// Route playback and focus through the alarm channel
    pub use_alarm_channel: bool,
    /// Focus kind for `request_focus`
    pub audio_focus_type: FocusGain,
}

impl PlayerOptions {
    /// Parse an options record from JSON. Empty input and `null` yield defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let trimmed = json.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    /// Logical channel selected by these options
    pub fn channel(&self) -> VolumeChannel {
        if self.use_alarm_channel {
            VolumeChannel::Alarm
        } else {
            VolumeChannel::Normal
        }
    }
}
