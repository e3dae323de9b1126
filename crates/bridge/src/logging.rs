// Logger installation

use log::LevelFilter;
use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Backend settings. `tag` is the Android log tag; elsewhere `RUST_LOG`
/// overrides `level`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub tag: String,
    pub level: LevelFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            tag: "SoundBridge".to_string(),
            level: LevelFilter::Info,
        }
    }
}

pub fn init_logging() {
    init_logging_with(&LoggingConfig::default());
}

/// Install the platform logger. Only the first call has any effect.
pub fn init_logging_with(config: &LoggingConfig) {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(config.level)
                    .with_tag(config.tag.as_str()),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            // Another logger may already be installed by the host
            let _ = env_logger::Builder::new()
                .filter_level(config.level)
                .parse_default_env()
                .try_init();
        }

        log::debug!("Logging initialised ({}, {})", config.tag, config.level);
    });
}
