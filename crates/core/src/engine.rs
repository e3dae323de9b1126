// Platform media engine seam
// The engine decodes and outputs audio; sessions only drive it through this trait.

use crate::error::Result;
use crate::platform::VolumeChannel;
use crate::source::SourceDescriptor;
use std::sync::Arc;

/// Asynchronous notifications from the engine's playback thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// `prepare_async` finished
    Prepared { duration_ms: i64 },
    /// End of stream reached
    Completed,
    /// Decode/playback failure (`what`/`extra` codes)
    Error { code: i32, extra: i32 },
}

/// Listener installed by the owning session
pub type EngineListener = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Media engine driven by one session
///
/// Implementations must deliver events from their own execution context and
/// never call the listener from inside one of these methods.
pub trait MediaEngine: Send {
    /// Select output routing
    fn set_attributes(&mut self, channel: VolumeChannel) -> Result<()>;

    /// Hand over a resolved source
    fn set_source(&mut self, source: &SourceDescriptor) -> Result<()>;

    /// Install or detach the event listener
    fn set_listener(&mut self, listener: Option<EngineListener>);

    /// Begin preparing; completion arrives as `EngineEvent::Prepared` or `Error`
    fn prepare_async(&mut self) -> Result<()>;

    /// Start or resume playback
    fn start(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self) -> Result<()>;

    /// Seek to a position (in milliseconds)
    fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    /// Per-channel gain (0.0 - 1.0)
    fn set_volume(&mut self, left: f32, right: f32) -> Result<()>;

    fn set_looping(&mut self, looping: bool) -> Result<()>;

    /// Playback speed (1.0 = normal). Fails with `UnsupportedOperation` where
    /// the platform lacks variable-rate playback.
    fn set_playback_rate(&mut self, rate: f32) -> Result<()>;

    /// Current position in milliseconds
    fn current_position(&self) -> i64;

    fn is_playing(&self) -> bool;

    /// Return to the uninitialised state
    fn reset(&mut self) -> Result<()>;

    /// Free all native resources. Called exactly once per engine.
    fn release(&mut self) -> Result<()>;
}

/// Creates one engine per session
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn MediaEngine>>;
}
