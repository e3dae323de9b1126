// Host audio-manager abstraction
// Implemented by the embedding application (Android AudioManager, a desktop mixer, a fake in tests)

use crate::error::Result;
use crate::focus::FocusChangeSink;
use crate::options::{FocusGain, PlayerOptions};

/// Logical routing channel for volume and focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeChannel {
    /// Media playback
    Normal,
    /// Alarm stream, audible even when media is muted
    Alarm,
}

/// Usage attribute attached to focus requests and engine output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageHint {
    Media,
    Alarm,
}

impl UsageHint {
    pub fn for_channel(channel: VolumeChannel) -> Self {
        match channel {
            VolumeChannel::Normal => UsageHint::Media,
            VolumeChannel::Alarm => UsageHint::Alarm,
        }
    }
}

/// Audio focus request as handed to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusRequest {
    pub channel: VolumeChannel,
    pub gain: FocusGain,
    pub usage: UsageHint,
}

impl FocusRequest {
    pub fn new(channel: VolumeChannel, gain: FocusGain) -> Self {
        Self {
            channel,
            gain,
            usage: UsageHint::for_channel(channel),
        }
    }

    pub fn from_options(options: &PlayerOptions) -> Self {
        Self::new(options.channel(), options.audio_focus_type)
    }
}

/// Outcome of a focus request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusResult {
    Granted,
    Delayed,
    Failed,
}

impl FocusResult {
    /// Map an `AUDIOFOCUS_REQUEST_*` code. Anything unknown counts as failed.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FocusResult::Granted,
            2 => FocusResult::Delayed,
            _ => FocusResult::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusResult::Granted => "granted",
            FocusResult::Delayed => "delayed",
            FocusResult::Failed => "failed",
        }
    }
}

/// Opaque platform handle for an outstanding focus request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FocusToken(pub u64);

/// Platform answer to a focus request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusResponse {
    pub result: FocusResult,
    pub token: FocusToken,
}

/// System audio manager
///
/// State (volume indices, mute, speakerphone, held focus) lives on the
/// platform side; callers query it on every use.
pub trait AudioPlatform: Send + Sync {
    /// Ask for focus. Asynchronous focus changes are reported through `sink`
    /// with raw `AUDIOFOCUS_*` codes.
    fn request_focus(&self, request: &FocusRequest, sink: FocusChangeSink) -> Result<FocusResponse>;

    /// Give up a previously requested focus
    fn abandon_focus(&self, token: FocusToken) -> Result<()>;

    /// Whether request objects (and therefore delayed grants) are available
    fn supports_focus_requests(&self) -> bool {
        true
    }

    /// Whether `GainTransientExclusive` can be honoured
    fn supports_exclusive_focus(&self) -> bool {
        true
    }

    /// Current volume index of a channel
    fn stream_volume(&self, channel: VolumeChannel) -> Result<u32>;

    /// Maximum volume index of a channel
    fn max_stream_volume(&self, channel: VolumeChannel) -> Result<u32>;

    /// Set the volume index of a channel
    fn set_stream_volume(&self, channel: VolumeChannel, index: u32) -> Result<()>;

    /// Mute or unmute a channel
    fn set_stream_mute(&self, channel: VolumeChannel, muted: bool) -> Result<()>;

    /// Switch the device into in-communication mode
    fn set_communication_mode(&self) -> Result<()>;

    /// Route output to the loudspeaker
    fn set_speakerphone_on(&self, on: bool) -> Result<()>;

    /// Bind hardware volume keys to a channel, `None` restores the default
    fn set_volume_control_stream(&self, channel: Option<VolumeChannel>) -> Result<()>;
}

/// Raw resources packaged with the application
pub trait ResourceCatalog: Send + Sync {
    fn contains(&self, name: &str) -> bool;
}
