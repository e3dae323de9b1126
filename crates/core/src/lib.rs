// Core types and services for multi-session sound playback

pub mod callback;
pub mod engine;
pub mod error;
pub mod focus;
pub mod options;
pub mod platform;
pub mod registry;
pub mod session;
pub mod source;
pub mod state;
pub mod volume;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types
pub use callback::CallbackGuard;
pub use engine::{EngineEvent, EngineFactory, EngineListener, MediaEngine};
pub use error::{LoadError, Result, SoundError};
pub use focus::{AudioFocusCoordinator, FocusChange, FocusChangeSink, FocusGrant, FocusObserver};
pub use options::{FocusGain, PlayerOptions};
pub use platform::{
    AudioPlatform, FocusRequest, FocusResponse, FocusResult, FocusToken, ResourceCatalog,
    UsageHint, VolumeChannel,
};
pub use registry::SessionRegistry;
pub use session::{CompletionCallback, PlayerSession, PreparedInfo, SessionRef};
pub use source::{compose_source_id, DataSourceResolver, ResolverConfig, SourceDescriptor};
pub use state::SessionState;
pub use volume::VolumeController;
