// Process-scoped sound module
//
// One module per process, installed by the host with its platform services and
// torn down explicitly at application exit. Every verb takes primitive arguments
// and reports failures as `ErrorRecord`s.

use crate::logging::init_logging;
use crate::record::ErrorRecord;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use sound_core::{
    compose_source_id, AudioFocusCoordinator, AudioPlatform, DataSourceResolver, EngineFactory,
    FocusChange, FocusRequest, FocusResult, PlayerOptions, PreparedInfo, ResolverConfig,
    ResourceCatalog, SessionRegistry, SessionState, VolumeController,
};
use std::sync::Arc;

type BridgeResult<T> = Result<T, ErrorRecord>;

static MODULE: Lazy<RwLock<Option<Arc<SoundModule>>>> = Lazy::new(|| RwLock::new(None));

/// Platform services supplied by the host application
#[derive(Clone)]
pub struct Platform {
    pub engines: Arc<dyn EngineFactory>,
    pub audio: Arc<dyn AudioPlatform>,
    pub resources: Arc<dyn ResourceCatalog>,
    pub resolver: ResolverConfig,
}

impl Platform {
    pub fn new(
        engines: Arc<dyn EngineFactory>,
        audio: Arc<dyn AudioPlatform>,
        resources: Arc<dyn ResourceCatalog>,
    ) -> Self {
        Self {
            engines,
            audio,
            resources,
            resolver: ResolverConfig::default(),
        }
    }
}

pub struct SoundModule {
    registry: SessionRegistry,
    focus: AudioFocusCoordinator,
    volume: VolumeController,
}

fn parse_options(options_json: &str) -> BridgeResult<PlayerOptions> {
    Ok(PlayerOptions::from_json(options_json)?)
}

impl SoundModule {
    pub fn new(platform: Platform) -> Self {
        let resolver = DataSourceResolver::with_config(platform.resources, platform.resolver);
        Self {
            registry: SessionRegistry::new(platform.engines, resolver),
            focus: AudioFocusCoordinator::new(platform.audio.clone()),
            volume: VolumeController::new(platform.audio),
        }
    }

    /// Load `source_id` under `handle`. `on_loaded` receives the duration or
    /// the error exactly once; an unparsable options record fails the load.
    pub fn load<F>(&self, handle: i32, source_id: &str, options_json: &str, on_loaded: F)
    where
        F: FnOnce(BridgeResult<PreparedInfo>) + Send + 'static,
    {
        let options = match parse_options(options_json) {
            Ok(options) => options,
            Err(err) => {
                log::error!("{} - {}", handle, err);
                on_loaded(Err(err));
                return;
            }
        };
        self.registry
            .create(handle, source_id, &options, move |result| {
                on_loaded(result.map_err(ErrorRecord::from))
            });
    }

    /// Load by file name, relative to `base_path` or as a bundled resource
    pub fn load_file<F>(
        &self,
        handle: i32,
        file_name: &str,
        base_path: Option<&str>,
        options_json: &str,
        on_loaded: F,
    ) where
        F: FnOnce(BridgeResult<PreparedInfo>) + Send + 'static,
    {
        let source_id = compose_source_id(file_name, base_path);
        self.load(handle, &source_id, options_json, on_loaded);
    }

    pub fn play<F>(&self, handle: i32, on_end: Option<F>) -> BridgeResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let on_end = on_end.map(|f| Box::new(f) as sound_core::CompletionCallback);
        Ok(self.registry.play(handle, on_end)?)
    }

    pub fn pause(&self, handle: i32) -> BridgeResult<()> {
        Ok(self.registry.pause(handle)?)
    }

    pub fn stop(&self, handle: i32) -> BridgeResult<()> {
        Ok(self.registry.stop(handle)?)
    }

    pub fn reset(&self, handle: i32) -> BridgeResult<()> {
        Ok(self.registry.reset(handle)?)
    }

    pub fn release(&self, handle: i32) -> BridgeResult<()> {
        Ok(self.registry.release(handle)?)
    }

    pub fn set_volume(&self, handle: i32, left: f32, right: f32) -> BridgeResult<()> {
        Ok(self.registry.set_volume(handle, left, right)?)
    }

    pub fn set_looping(&self, handle: i32, looping: bool) -> BridgeResult<()> {
        Ok(self.registry.set_looping(handle, looping)?)
    }

    pub fn set_speed(&self, handle: i32, rate: f32) -> BridgeResult<()> {
        Ok(self.registry.set_speed(handle, rate)?)
    }

    /// Seek to `position_ms`; negative positions seek to the start
    pub fn set_current_time(&self, handle: i32, position_ms: i64) -> BridgeResult<()> {
        Ok(self.registry.seek(handle, position_ms.max(0) as u64)?)
    }

    pub fn set_error_callback<F>(&self, handle: i32, on_error: F)
    where
        F: FnOnce(ErrorRecord) + Send + 'static,
    {
        self.registry
            .set_error_callback(handle, move |err| on_error(ErrorRecord::from(err)));
    }

    pub fn get_current_time(&self, handle: i32) -> i64 {
        self.registry.get_position(handle)
    }

    pub fn get_duration(&self, handle: i32) -> i64 {
        self.registry.get_duration(handle)
    }

    pub fn is_playing(&self, handle: i32) -> bool {
        self.registry.is_playing(handle)
    }

    pub fn get_state(&self, handle: i32) -> Option<SessionState> {
        self.registry.get_state(handle)
    }

    pub fn request_audio_focus(&self, options_json: &str) -> BridgeResult<FocusResult> {
        let options = parse_options(options_json)?;
        Ok(self.focus.request_focus(FocusRequest::from_options(&options))?)
    }

    pub fn abandon_audio_focus(&self) -> BridgeResult<()> {
        Ok(self.focus.abandon_focus()?)
    }

    /// Install the focus change observer, replacing any previous one
    pub fn set_audio_focus_listener<F>(&self, listener: Option<F>)
    where
        F: Fn(FocusChange) + Send + Sync + 'static,
    {
        self.focus.set_focus_change_listener(
            listener.map(|f| Arc::new(f) as sound_core::FocusObserver),
        );
    }

    pub fn get_system_volume(&self, options_json: &str) -> BridgeResult<f32> {
        let options = parse_options(options_json)?;
        Ok(self.volume.get_system_volume(options.channel())?)
    }

    pub fn set_system_volume(&self, value: f32, options_json: &str) -> BridgeResult<()> {
        let options = parse_options(options_json)?;
        Ok(self.volume.set_system_volume(options.channel(), value)?)
    }

    pub fn set_mute(&self, muted: bool) -> BridgeResult<()> {
        Ok(self.volume.set_mute(muted)?)
    }

    pub fn set_speakerphone_on(&self, handle: i32, on: bool) -> BridgeResult<()> {
        Ok(self.volume.route_to_speaker(&self.registry, handle, on)?)
    }

    pub fn set_volume_control_stream(&self, options_json: &str) -> BridgeResult<()> {
        let options = parse_options(options_json)?;
        Ok(self.volume.set_volume_control_stream(options.channel())?)
    }

    pub fn reset_volume_control_stream(&self) -> BridgeResult<()> {
        Ok(self.volume.reset_volume_control_stream()?)
    }

    /// Release every session and give up audio focus
    pub fn shutdown(&self) {
        self.registry.drain_all();
        self.focus.shutdown();
    }
}

/// Install the process-wide module. An already installed module is shut down first.
///
/// The C ABI and JNI entry points only operate on an installed module; until
/// the host calls this, every verb reports `not_installed`. There is no Java
/// side installer: an Android host links a Rust crate that builds the
/// [`Platform`] (engine factory, audio manager, resource catalog) and calls
/// `install` from its `JNI_OnLoad` or startup hook.
pub fn install(platform: Platform) -> Arc<SoundModule> {
    init_logging();
    let module = Arc::new(SoundModule::new(platform));
    let previous = MODULE.write().replace(module.clone());
    if let Some(previous) = previous {
        log::warn!("Sound module reinstalled, shutting down the previous one");
        previous.shutdown();
    }
    log::info!("Sound module installed");
    module
}

/// The installed module, if any
pub fn module() -> Option<Arc<SoundModule>> {
    MODULE.read().clone()
}

pub(crate) fn with_module<T>(f: impl FnOnce(&SoundModule) -> BridgeResult<T>) -> BridgeResult<T> {
    let module = module().ok_or_else(ErrorRecord::not_installed)?;
    f(&module)
}

/// Tear down the installed module. A no-op when none is installed.
pub fn shutdown() {
    let module = MODULE.write().take();
    if let Some(module) = module {
        module.shutdown();
        log::info!("Sound module shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sound_core::testing::{FakePlatform, ScriptedEngineFactory, StaticCatalog};
    use sound_core::FocusGain;
    use serial_test::serial;
    use std::sync::mpsc;

    fn module() -> (SoundModule, Arc<ScriptedEngineFactory>, Arc<FakePlatform>) {
        let engines = ScriptedEngineFactory::new();
        let audio = FakePlatform::new();
        let platform = Platform::new(
            engines.clone(),
            audio.clone(),
            Arc::new(StaticCatalog::new(["beep"])),
        );
        (SoundModule::new(platform), engines, audio)
    }

    #[test]
    fn load_reports_duration() {
        let (module, engines, _) = module();
        let (tx, rx) = mpsc::channel();
        module.load_file(1, "Beep.WAV", None, "{}", move |r| {
            let _ = tx.send(r);
        });
        engines.last().prepared(640);

        assert_eq!(rx.try_recv().unwrap().unwrap().duration_ms, 640);
        assert_eq!(module.get_duration(1), 640);
        assert_eq!(module.get_state(1), Some(SessionState::Prepared));
    }

    #[test]
    fn bad_options_fail_the_load() {
        let (module, engines, _) = module();
        let (tx, rx) = mpsc::channel();
        module.load(1, "beep", "{\"audioFocusType\":\"loud\"}", move |r| {
            let _ = tx.send(r);
        });

        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.code, "invalid_options");
        assert_eq!(engines.created(), 0);
    }

    #[test]
    fn missing_handles() {
        let (module, _, _) = module();
        assert_eq!(module.play(7, None::<fn()>).unwrap_err().code, "session_not_found");
        assert!(module.pause(7).is_ok());
        assert!(module.set_current_time(7, -5).is_ok());
        assert_eq!(module.get_current_time(7), -1);
        assert!(!module.is_playing(7));
        assert_eq!(module.get_state(7), None);
    }

    #[test]
    fn focus_uses_options_record() {
        let (module, _, audio) = module();
        let result = module
            .request_audio_focus(r#"{"useAlarmChannel":true,"audioFocusType":"gainTransientMayDuck"}"#)
            .unwrap();
        assert_eq!(result, FocusResult::Granted);

        let request = audio.snapshot().requests[0];
        assert_eq!(request.gain, FocusGain::GainTransientMayDuck);
        assert_eq!(request.channel, sound_core::VolumeChannel::Alarm);

        module.abandon_audio_focus().unwrap();
        assert!(audio.snapshot().outstanding.is_empty());
    }

    #[test]
    fn system_volume_round_trip() {
        let (module, _, _) = module();
        module.set_system_volume(0.5, "").unwrap();
        let value = module.get_system_volume("").unwrap();
        assert!((value - 0.5).abs() <= 1.0 / 15.0);
    }

    #[test]
    fn shutdown_releases_everything() {
        let (module, engines, audio) = module();
        module.load(1, "beep", "", |_| {});
        module.load(2, "https://example.com/a.mp3", "", |_| {});
        module.request_audio_focus("").unwrap();

        module.shutdown();

        assert_eq!(engines.total_releases(), 2);
        assert_eq!(module.get_state(1), None);
        assert!(audio.snapshot().outstanding.is_empty());
    }

    #[test]
    #[serial]
    fn entry_points_need_an_installed_module() {
        super::shutdown();
        let err = with_module(|m| m.pause(1)).unwrap_err();
        assert_eq!(err.code, "not_installed");
        assert_eq!(err.status(), crate::record::STATUS_NOT_INSTALLED);

        let engines = ScriptedEngineFactory::new();
        install(Platform::new(
            engines.clone(),
            FakePlatform::new(),
            Arc::new(StaticCatalog::new(["beep"])),
        ));
        with_module(|m| m.pause(1)).unwrap();

        super::shutdown();
        assert!(super::module().is_none());
        assert_eq!(with_module(|m| m.stop(1)).unwrap_err().code, "not_installed");
    }
}
