// System volume and output routing

use crate::error::{Result, SoundError};
use crate::platform::{AudioPlatform, VolumeChannel};
use crate::registry::SessionRegistry;
use std::sync::Arc;

/// Stateless front to the platform's volume controls. Platform failures are
/// always propagated.
pub struct VolumeController {
    platform: Arc<dyn AudioPlatform>,
}

impl VolumeController {
    pub fn new(platform: Arc<dyn AudioPlatform>) -> Self {
        Self { platform }
    }

    /// Current volume of `channel` as a ratio in 0.0 - 1.0
    pub fn get_system_volume(&self, channel: VolumeChannel) -> Result<f32> {
        let max = self.platform.max_stream_volume(channel)?;
        if max == 0 {
            return Err(SoundError::Platform(format!(
                "{:?} channel reports no volume steps",
                channel
            )));
        }
        let current = self.platform.stream_volume(channel)?;
        Ok(current as f32 / max as f32)
    }

    /// Set the volume of `channel`, rounded to the nearest platform step
    pub fn set_system_volume(&self, channel: VolumeChannel, value: f32) -> Result<()> {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let max = self.platform.max_stream_volume(channel)?;
        let index = (max as f32 * value).round() as u32;
        self.platform.set_stream_volume(channel, index)?;

        log::info!("Set {:?} volume to {}/{}", channel, index, max);
        Ok(())
    }

    pub fn set_mute(&self, muted: bool) -> Result<()> {
        self.platform.set_stream_mute(VolumeChannel::Normal, muted)?;
        log::info!("Set mute to {}", muted);
        Ok(())
    }

    /// Bind the hardware volume keys to `channel`
    pub fn set_volume_control_stream(&self, channel: VolumeChannel) -> Result<()> {
        self.platform.set_volume_control_stream(Some(channel))
    }

    /// Give the hardware volume keys back to the platform default
    pub fn reset_volume_control_stream(&self) -> Result<()> {
        self.platform.set_volume_control_stream(None)
    }

    /// Route a session's output to the loudspeaker. A no-op for unknown handles.
    pub fn route_to_speaker(&self, registry: &SessionRegistry, handle: i32, on: bool) -> Result<()> {
        let Some(session) = registry.get(handle) else {
            log::warn!("{} - setSpeakerphoneOn ignored, undefined player", handle);
            return Ok(());
        };
        session.use_normal_channel()?;
        self.platform.set_communication_mode()?;
        self.platform.set_speakerphone_on(on)?;

        log::info!("{} - Set speakerphone to {}", handle, on);
        Ok(())
    }
}
