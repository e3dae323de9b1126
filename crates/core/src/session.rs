// Player session: one state machine wrapping one media engine
//
// All field access goes through the session mutex. Engine notifications carry the
// epoch they were installed with; a reset or release bumps the epoch so anything
// still in flight for the old engine state is dropped.

use crate::callback::CallbackGuard;
use crate::engine::{EngineEvent, EngineListener, MediaEngine};
use crate::error::{Result, SoundError};
use crate::options::PlayerOptions;
use crate::platform::VolumeChannel;
use crate::source::SourceDescriptor;
use crate::state::SessionState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Reported once the engine is prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedInfo {
    pub duration_ms: i64,
}

/// Load continuation: prepared info or the load failure
pub type LoadGuard = CallbackGuard<Result<PreparedInfo>>;

/// End-of-stream notification attached by `play`
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Shared, non-owning reference handed out by the registry
pub type SessionRef = Arc<PlayerSession>;

pub struct PlayerSession {
    handle: i32,
    id: u64,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: SessionState,
    engine: Option<Box<dyn MediaEngine>>,
    looping: bool,
    playback_rate: f32,
    duration_ms: i64,
    epoch: u64,
    on_prepared: Option<Arc<LoadGuard>>,
    on_completion: Option<Arc<CallbackGuard<()>>>,
    on_error: Option<Arc<CallbackGuard<SoundError>>>,
}

impl SessionInner {
    fn engine(&mut self) -> Result<&mut (dyn MediaEngine + 'static)> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(SoundError::InvalidState("Engine already released".to_string())),
        }
    }

    fn set_state(&mut self, handle: i32, state: SessionState) {
        log::debug!("{} - State changed: {:?} -> {:?}", handle, self.state, state);
        self.state = state;
    }

    /// Detach the engine listener and drop every pending callback
    fn detach(&mut self) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.set_listener(None);
        }
        self.on_prepared = None;
        self.on_completion = None;
        self.on_error = None;
    }
}

impl PlayerSession {
    pub(crate) fn new(handle: i32, engine: Box<dyn MediaEngine>) -> SessionRef {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("{} - Created session #{}", handle, id);
        Arc::new(Self {
            handle,
            id,
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                engine: Some(engine),
                looping: false,
                playback_rate: 1.0,
                duration_ms: -1,
                epoch: 0,
                on_prepared: None,
                on_completion: None,
                on_error: None,
            }),
        })
    }

    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Process-unique identity; differs between sessions that reuse a handle
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Idle -> Preparing: wire the engine to `source` and start preparing.
    /// The outcome is delivered through `on_loaded`.
    pub(crate) fn begin_prepare(
        self: &Arc<Self>,
        source: &SourceDescriptor,
        options: &PlayerOptions,
        on_loaded: Arc<LoadGuard>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.state.validate_transition(SessionState::Preparing)?;
        inner.set_state(self.handle, SessionState::Preparing);
        inner.on_prepared = Some(on_loaded);

        let listener = self.listener(inner.epoch);
        let engine = inner.engine()?;
        engine.set_listener(Some(listener));
        engine.set_attributes(options.channel())?;
        engine.set_source(source)?;
        engine.prepare_async()?;

        log::debug!(
            "{} - Load complete ({}). Waiting for onPrepared...",
            self.handle,
            source.kind()
        );
        Ok(())
    }

    fn listener(self: &Arc<Self>, epoch: u64) -> EngineListener {
        let session: Weak<PlayerSession> = Arc::downgrade(self);
        Arc::new(move |event: EngineEvent| match session.upgrade() {
            Some(session) => session.on_engine_event(epoch, event),
            None => log::debug!("Dropping {:?} for a dropped session", event),
        })
    }

    fn on_engine_event(&self, epoch: u64, event: EngineEvent) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.state == SessionState::Released {
            log::debug!("{} - Ignoring stale {:?}", self.handle, event);
            return;
        }

        match event {
            EngineEvent::Prepared { duration_ms } => {
                if inner.state != SessionState::Preparing {
                    log::warn!(
                        "{} - Prepared notification in state {:?}",
                        self.handle,
                        inner.state
                    );
                    return;
                }
                inner.set_state(self.handle, SessionState::Prepared);
                inner.duration_ms = duration_ms;
                let guard = inner.on_prepared.take();
                drop(inner);

                log::info!("{} - Prepared completed! duration={}ms", self.handle, duration_ms);
                if let Some(guard) = guard {
                    guard.fire(Ok(PreparedInfo { duration_ms }));
                }
            }
            EngineEvent::Completed => {
                if inner.looping {
                    log::debug!("{} - Looping, completion suppressed", self.handle);
                    return;
                }
                if inner.state != SessionState::Playing {
                    log::warn!(
                        "{} - Completion notification in state {:?}",
                        self.handle,
                        inner.state
                    );
                    return;
                }
                inner.set_state(self.handle, SessionState::Stopped);
                let guard = inner.on_completion.clone();
                drop(inner);

                match guard {
                    Some(guard) => {
                        if guard.fire(()) {
                            log::info!("{} - Playing complete!", self.handle);
                        }
                    }
                    None => log::debug!("{} - Playing complete, no listener", self.handle),
                }
            }
            EngineEvent::Error { code, extra } => {
                log::error!("{} - Error. What: {} extra: {}", self.handle, code, extra);
                let err = SoundError::Engine { code, extra };

                if inner.state == SessionState::Preparing {
                    inner.set_state(self.handle, SessionState::Failed);
                    let guard = inner.on_prepared.take();
                    drop(inner);
                    if let Some(guard) = guard {
                        guard.fire(Err(err));
                    }
                } else {
                    let guard = inner.on_error.clone();
                    drop(inner);
                    match guard {
                        Some(guard) => {
                            guard.fire(err);
                        }
                        None => log::error!("{} - No error callback registered", self.handle),
                    }
                }
            }
        }
    }

    /// Start playback. A no-op while already playing, and a logged no-op in
    /// any state that cannot start (preparing, idle, failed, released). The
    /// completion listener is only replaced when playback actually starts.
    pub fn play(&self, on_end: Option<CompletionCallback>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Playing {
            log::debug!("{} - Already playing", self.handle);
            return Ok(());
        }
        if !inner.state.can_start() {
            log::warn!("{} - Play ignored in state {:?}", self.handle, inner.state);
            return Ok(());
        }

        inner.on_completion =
            on_end.map(|callback| Arc::new(CallbackGuard::new("completion", move |()| callback())));
        inner.engine()?.start()?;
        inner.set_state(self.handle, SessionState::Playing);

        log::info!("{} - Started playing...", self.handle);
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Playing {
            log::debug!("{} - Pause ignored in state {:?}", self.handle, inner.state);
            return Ok(());
        }
        inner.engine()?.pause()?;
        inner.set_state(self.handle, SessionState::Paused);

        log::info!("{} - Paused", self.handle);
        Ok(())
    }

    /// Pause and rewind to the start
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, SessionState::Playing | SessionState::Paused) {
            log::debug!("{} - Stop ignored in state {:?}", self.handle, inner.state);
            return Ok(());
        }
        let engine = inner.engine()?;
        engine.pause()?;
        engine.seek_to(0)?;
        inner.set_state(self.handle, SessionState::Stopped);

        log::info!("{} - Stopped", self.handle);
        Ok(())
    }

    /// Return the engine to its uninitialised state. Pending notifications
    /// and callbacks are dropped.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Released {
            return Ok(());
        }
        inner.epoch += 1;
        inner.detach();
        inner.engine()?.reset()?;
        inner.duration_ms = -1;
        inner.set_state(self.handle, SessionState::Idle);

        log::info!("{} - Resetted", self.handle);
        Ok(())
    }

    /// Detach listeners and release the engine. Safe to call more than once;
    /// the engine is released exactly once.
    pub fn release(&self) -> Result<()> {
        let engine = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Released {
                return Ok(());
            }
            inner.epoch += 1;
            inner.detach();
            inner.set_state(self.handle, SessionState::Released);
            inner.engine.take()
        };

        if let Some(mut engine) = engine {
            engine.release()?;
        }
        log::info!("{} - Released!", self.handle);
        Ok(())
    }

    /// Teardown used at application exit: drop callbacks, stop if playing,
    /// reset, release. Engine failures are logged and teardown continues.
    pub(crate) fn shutdown(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Released {
                return Ok(());
            }
            inner.epoch += 1;
            inner.detach();

            let was_playing = inner.state == SessionState::Playing;
            if let Some(engine) = inner.engine.as_deref_mut() {
                if was_playing || engine.is_playing() {
                    if let Err(e) = engine.pause() {
                        log::error!("{} - Failed to stop during shutdown: {}", self.handle, e);
                    }
                }
                if let Err(e) = engine.reset() {
                    log::error!("{} - Failed to reset during shutdown: {}", self.handle, e);
                }
            }
            if was_playing {
                inner.set_state(self.handle, SessionState::Stopped);
            }
        }
        self.release()
    }

    /// Set left/right gain, each clamped to 0.0 - 1.0
    pub fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Released {
            return Ok(());
        }
        let (left, right) = (clamp_gain(left), clamp_gain(right));
        inner.engine()?.set_volume(left, right)?;

        log::info!("{} - Set volume - Left: {}, Right: {}", self.handle, left, right);
        Ok(())
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Released {
            return Ok(());
        }
        inner.engine()?.set_looping(looping)?;
        inner.looping = looping;

        log::info!("{} - Set looping to {}", self.handle, looping);
        Ok(())
    }

    pub fn set_speed(&self, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SoundError::InvalidOptions(format!(
                "Playback rate must be > 0, got {}",
                rate
            )));
        }
        let mut inner = self.inner.lock();
        if !inner.state.is_prepared_or_later() {
            log::debug!("{} - Speed ignored in state {:?}", self.handle, inner.state);
            return Ok(());
        }
        inner.engine()?.set_playback_rate(rate)?;
        inner.playback_rate = rate;

        log::info!("{} - Set speed to {}", self.handle, rate);
        Ok(())
    }

    pub fn seek(&self, position_ms: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.state.is_prepared_or_later() {
            log::debug!("{} - Seek ignored in state {:?}", self.handle, inner.state);
            return Ok(());
        }
        inner.engine()?.seek_to(position_ms)?;

        log::info!("{} - Set current millis to: {}", self.handle, position_ms);
        Ok(())
    }

    /// Route the engine back to the normal channel (speakerphone routing)
    pub(crate) fn use_normal_channel(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Released {
            return Ok(());
        }
        inner.engine()?.set_attributes(VolumeChannel::Normal)
    }

    /// Install the one-shot error slot
    pub fn set_error_callback<F>(&self, on_error: F)
    where
        F: FnOnce(SoundError) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Released {
            return;
        }
        inner.on_error = Some(Arc::new(CallbackGuard::new("error", on_error)));
        log::debug!("{} - Added error callback", self.handle);
    }

    /// Position in milliseconds, -1 once released
    pub fn position(&self) -> i64 {
        let inner = self.inner.lock();
        inner
            .engine
            .as_deref()
            .map(|engine| engine.current_position())
            .unwrap_or(-1)
    }

    pub fn is_playing(&self) -> bool {
        let inner = self.inner.lock();
        inner
            .engine
            .as_deref()
            .map(|engine| engine.is_playing())
            .unwrap_or(false)
    }

    /// Duration reported by prepare, -1 before that
    pub fn duration(&self) -> i64 {
        self.inner.lock().duration_ms
    }

    pub fn is_looping(&self) -> bool {
        self.inner.lock().looping
    }

    pub fn playback_rate(&self) -> f32 {
        self.inner.lock().playback_rate
    }
}

fn clamp_gain(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
