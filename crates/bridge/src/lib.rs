// Bridge for the sound module
// Provides a process-scoped module, a C ABI and JNI entrypoints over sound-core.

pub mod ffi;
pub mod logging;
pub mod module;
pub mod record;

// -------------------------------
// JNI bindings for Android/JVM
// -------------------------------
#[cfg(any(feature = "android", feature = "jvm"))]
mod jni_bridge;

pub use logging::{init_logging, init_logging_with, LoggingConfig};
pub use module::{install, module, shutdown, Platform, SoundModule};
pub use record::{to_code, ErrorRecord};
