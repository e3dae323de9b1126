// Scripted engine and fake audio platform
// Tests play the role of the platform thread: they inject engine events and focus
// changes through controllers and inspect the calls that reached the platform.

use crate::engine::{EngineEvent, EngineFactory, EngineListener, MediaEngine};
use crate::error::{Result, SoundError};
use crate::focus::FocusChangeSink;
use crate::platform::{
    AudioPlatform, FocusRequest, FocusResponse, FocusResult, FocusToken, ResourceCatalog,
    VolumeChannel,
};
use crate::source::SourceDescriptor;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Engine method invocations, in order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetAttributes(VolumeChannel),
    SetSource(SourceDescriptor),
    PrepareAsync,
    Start,
    Pause,
    SeekTo(u64),
    SetVolume(f32, f32),
    SetLooping(bool),
    SetPlaybackRate(f32),
    Reset,
    Release,
}

#[derive(Default)]
struct EngineShared {
    calls: Vec<EngineCall>,
    listener: Option<EngineListener>,
    last_listener: Option<EngineListener>,
    playing: bool,
    position_ms: i64,
}

/// Engine whose events are driven by an [`EngineController`]
pub struct ScriptedEngine {
    shared: Arc<Mutex<EngineShared>>,
    playback_rate_supported: bool,
    fail_source: bool,
    fail_release: bool,
}

impl ScriptedEngine {
    fn record(&self, call: EngineCall) {
        self.shared.lock().calls.push(call);
    }
}

impl MediaEngine for ScriptedEngine {
    fn set_attributes(&mut self, channel: VolumeChannel) -> Result<()> {
        self.record(EngineCall::SetAttributes(channel));
        Ok(())
    }

    fn set_source(&mut self, source: &SourceDescriptor) -> Result<()> {
        self.record(EngineCall::SetSource(source.clone()));
        if self.fail_source {
            return Err(SoundError::Platform("setDataSource failed".to_string()));
        }
        Ok(())
    }

    fn set_listener(&mut self, listener: Option<EngineListener>) {
        let mut shared = self.shared.lock();
        if listener.is_some() {
            shared.last_listener = listener.clone();
        }
        shared.listener = listener;
    }

    fn prepare_async(&mut self) -> Result<()> {
        self.record(EngineCall::PrepareAsync);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.calls.push(EngineCall::Start);
        shared.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.calls.push(EngineCall::Pause);
        shared.playing = false;
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.calls.push(EngineCall::SeekTo(position_ms));
        shared.position_ms = position_ms as i64;
        Ok(())
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.record(EngineCall::SetVolume(left, right));
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.record(EngineCall::SetLooping(looping));
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        if !self.playback_rate_supported {
            return Err(SoundError::UnsupportedOperation(
                "variable playback rate".to_string(),
            ));
        }
        self.record(EngineCall::SetPlaybackRate(rate));
        Ok(())
    }

    fn current_position(&self) -> i64 {
        self.shared.lock().position_ms
    }

    fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }

    fn reset(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.calls.push(EngineCall::Reset);
        shared.playing = false;
        shared.position_ms = 0;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        shared.calls.push(EngineCall::Release);
        shared.playing = false;
        if self.fail_release {
            return Err(SoundError::Platform("release failed".to_string()));
        }
        Ok(())
    }
}

/// Test-side handle onto one [`ScriptedEngine`]
#[derive(Clone)]
pub struct EngineController {
    shared: Arc<Mutex<EngineShared>>,
}

impl EngineController {
    /// Deliver `event` to the currently installed listener.
    /// Returns `false` when no listener is attached.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let listener = self.shared.lock().listener.clone();
        Self::deliver(listener, event)
    }

    /// Deliver `event` to the last listener ever installed, even if it has
    /// since been detached (a notification already in flight).
    pub fn emit_late(&self, event: EngineEvent) -> bool {
        let listener = self.shared.lock().last_listener.clone();
        Self::deliver(listener, event)
    }

    fn deliver(listener: Option<EngineListener>, event: EngineEvent) -> bool {
        match listener {
            Some(listener) => {
                (*listener)(event);
                true
            }
            None => false,
        }
    }

    pub fn prepared(&self, duration_ms: i64) -> bool {
        self.emit(EngineEvent::Prepared { duration_ms })
    }

    /// End of stream
    pub fn complete(&self) -> bool {
        self.shared.lock().playing = false;
        self.emit(EngineEvent::Completed)
    }

    pub fn fail(&self, code: i32, extra: i32) -> bool {
        self.emit(EngineEvent::Error { code, extra })
    }

    pub fn set_position(&self, position_ms: i64) {
        self.shared.lock().position_ms = position_ms;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.lock().calls.clone()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.shared.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn release_count(&self) -> usize {
        self.count(&EngineCall::Release)
    }

    pub fn has_listener(&self) -> bool {
        self.shared.lock().listener.is_some()
    }
}

/// Factory producing [`ScriptedEngine`]s and keeping a controller for each
pub struct ScriptedEngineFactory {
    engines: Mutex<Vec<EngineController>>,
    playback_rate_supported: AtomicBool,
    fail_next_create: AtomicBool,
    fail_next_source: AtomicBool,
    fail_next_release: AtomicBool,
}

impl ScriptedEngineFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            engines: Mutex::new(Vec::new()),
            playback_rate_supported: AtomicBool::new(true),
            fail_next_create: AtomicBool::new(false),
            fail_next_source: AtomicBool::new(false),
            fail_next_release: AtomicBool::new(false),
        })
    }

    pub fn set_playback_rate_supported(&self, supported: bool) {
        self.playback_rate_supported.store(supported, Ordering::SeqCst);
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// The next engine rejects its source
    pub fn fail_next_source(&self) {
        self.fail_next_source.store(true, Ordering::SeqCst);
    }

    /// The next engine records its release and then reports failure
    pub fn fail_next_release(&self) {
        self.fail_next_release.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }

    /// Controller of the `index`-th engine created. Panics if out of range.
    pub fn engine(&self, index: usize) -> EngineController {
        self.engines.lock()[index].clone()
    }

    /// Controller of the most recently created engine. Panics if none.
    pub fn last(&self) -> EngineController {
        let engines = self.engines.lock();
        engines[engines.len() - 1].clone()
    }

    /// Total `release()` calls across every engine
    pub fn total_releases(&self) -> usize {
        self.engines.lock().iter().map(|e| e.release_count()).sum()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn create(&self) -> Result<Box<dyn MediaEngine>> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(SoundError::Platform("MediaPlayer unavailable".to_string()));
        }
        let shared = Arc::new(Mutex::new(EngineShared::default()));
        self.engines.lock().push(EngineController {
            shared: shared.clone(),
        });
        Ok(Box::new(ScriptedEngine {
            shared,
            playback_rate_supported: self.playback_rate_supported.load(Ordering::SeqCst),
            fail_source: self.fail_next_source.swap(false, Ordering::SeqCst),
            fail_release: self.fail_next_release.swap(false, Ordering::SeqCst),
        }))
    }
}

/// Observable state of a [`FakePlatform`]
#[derive(Debug, Clone)]
pub struct FakePlatformState {
    pub volumes: HashMap<VolumeChannel, u32>,
    pub max_volumes: HashMap<VolumeChannel, u32>,
    pub muted: HashMap<VolumeChannel, bool>,
    pub speakerphone: bool,
    pub communication_mode: bool,
    /// `Some(None)` after a reset to the default stream
    pub volume_control_stream: Option<Option<VolumeChannel>>,
    pub has_activity: bool,
    pub focus_result: FocusResult,
    pub legacy_focus: bool,
    pub exclusive_focus: bool,
    pub fail_focus: bool,
    /// `abandon_focus` fails and keeps the token outstanding
    pub fail_abandon: bool,
    pub fail_volume: bool,
    pub requests: Vec<FocusRequest>,
    pub outstanding: Vec<FocusToken>,
    pub abandoned: Vec<FocusToken>,
    next_token: u64,
}

impl Default for FakePlatformState {
    fn default() -> Self {
        Self {
            volumes: HashMap::from([(VolumeChannel::Normal, 7), (VolumeChannel::Alarm, 3)]),
            max_volumes: HashMap::from([(VolumeChannel::Normal, 15), (VolumeChannel::Alarm, 7)]),
            muted: HashMap::new(),
            speakerphone: false,
            communication_mode: false,
            volume_control_stream: None,
            has_activity: true,
            focus_result: FocusResult::Granted,
            legacy_focus: false,
            exclusive_focus: true,
            fail_focus: false,
            fail_abandon: false,
            fail_volume: false,
            requests: Vec::new(),
            outstanding: Vec::new(),
            abandoned: Vec::new(),
            next_token: 1,
        }
    }
}

/// In-memory audio manager
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<FakePlatformState>,
    sink: Mutex<Option<FocusChangeSink>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakePlatformState)) {
        f(&mut self.state.lock());
    }

    pub fn snapshot(&self) -> FakePlatformState {
        self.state.lock().clone()
    }

    /// Report a raw `AUDIOFOCUS_*` change to whoever requested focus last
    pub fn emit_focus_change(&self, code: i32) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.notify(code);
        }
    }

    fn check_volume(&self) -> Result<()> {
        if self.state.lock().fail_volume {
            return Err(SoundError::Platform("AudioManager unavailable".to_string()));
        }
        Ok(())
    }
}

impl AudioPlatform for FakePlatform {
    fn request_focus(&self, request: &FocusRequest, sink: FocusChangeSink) -> Result<FocusResponse> {
        let mut state = self.state.lock();
        if state.fail_focus {
            return Err(SoundError::Platform("requestAudioFocus threw".to_string()));
        }
        state.requests.push(*request);
        let token = FocusToken(state.next_token);
        state.next_token += 1;
        if state.focus_result != FocusResult::Failed {
            state.outstanding.push(token);
        }
        let result = state.focus_result;
        drop(state);

        *self.sink.lock() = Some(sink);
        Ok(FocusResponse { result, token })
    }

    fn abandon_focus(&self, token: FocusToken) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_abandon {
            return Err(SoundError::Platform("abandonAudioFocus failed".to_string()));
        }
        state.outstanding.retain(|t| *t != token);
        state.abandoned.push(token);
        Ok(())
    }

    fn supports_focus_requests(&self) -> bool {
        !self.state.lock().legacy_focus
    }

    fn supports_exclusive_focus(&self) -> bool {
        self.state.lock().exclusive_focus
    }

    fn stream_volume(&self, channel: VolumeChannel) -> Result<u32> {
        self.check_volume()?;
        Ok(self.state.lock().volumes.get(&channel).copied().unwrap_or(0))
    }

    fn max_stream_volume(&self, channel: VolumeChannel) -> Result<u32> {
        self.check_volume()?;
        Ok(self.state.lock().max_volumes.get(&channel).copied().unwrap_or(0))
    }

    fn set_stream_volume(&self, channel: VolumeChannel, index: u32) -> Result<()> {
        self.check_volume()?;
        self.state.lock().volumes.insert(channel, index);
        Ok(())
    }

    fn set_stream_mute(&self, channel: VolumeChannel, muted: bool) -> Result<()> {
        self.check_volume()?;
        self.state.lock().muted.insert(channel, muted);
        Ok(())
    }

    fn set_communication_mode(&self) -> Result<()> {
        self.check_volume()?;
        self.state.lock().communication_mode = true;
        Ok(())
    }

    fn set_speakerphone_on(&self, on: bool) -> Result<()> {
        self.check_volume()?;
        self.state.lock().speakerphone = on;
        Ok(())
    }

    fn set_volume_control_stream(&self, channel: Option<VolumeChannel>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.has_activity {
            return Err(SoundError::NoActivity);
        }
        state.volume_control_stream = Some(channel);
        Ok(())
    }
}

/// Fixed set of bundled resource names
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    names: HashSet<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ResourceCatalog for StaticCatalog {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
