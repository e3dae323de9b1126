// Handle -> session registry
//
// The map lock only guards insert/lookup/remove. Sessions are cloned out before any
// engine call, so a stuck engine on one handle never blocks verbs on another.

use crate::engine::EngineFactory;
use crate::error::{Result, SoundError};
use crate::options::PlayerOptions;
use crate::session::{CompletionCallback, LoadGuard, PlayerSession, PreparedInfo, SessionRef};
use crate::source::DataSourceResolver;
use crate::state::SessionState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SessionRegistry {
    factory: Arc<dyn EngineFactory>,
    resolver: DataSourceResolver,
    sessions: Mutex<HashMap<i32, SessionRef>>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn EngineFactory>, resolver: DataSourceResolver) -> Self {
        Self {
            factory,
            resolver,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session under `handle` and start preparing `source_id`.
    ///
    /// `on_loaded` receives the prepared info, or the resolution/engine error,
    /// exactly once. A session already registered under `handle` is released
    /// first, whether or not the new load succeeds.
    pub fn create<F>(&self, handle: i32, source_id: &str, options: &PlayerOptions, on_loaded: F)
    where
        F: FnOnce(Result<PreparedInfo>) + Send + 'static,
    {
        log::info!("{} - Loading {}", handle, source_id);
        let guard = Arc::new(LoadGuard::new("load", on_loaded));

        let prior = self.sessions.lock().remove(&handle);
        if let Some(prior) = prior {
            log::info!("{} - Replacing existing player", handle);
            if let Err(e) = prior.release() {
                log::error!("{} - Failed to release replaced player: {}", handle, e);
            }
        }

        let source = match self.resolver.resolve(source_id) {
            Ok(source) => source,
            Err(e) => {
                log::error!("{} - {}", handle, e);
                guard.fire(Err(e));
                return;
            }
        };

        let engine = match self.factory.create() {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("{} - Failed to create media engine: {}", handle, e);
                guard.fire(Err(e));
                return;
            }
        };

        let session = PlayerSession::new(handle, engine);
        let displaced = self.sessions.lock().insert(handle, session.clone());
        if let Some(displaced) = displaced {
            // A concurrent load won the race for the same handle
            if let Err(e) = displaced.release() {
                log::error!("{} - Failed to release displaced player: {}", handle, e);
            }
        }

        if let Err(e) = session.begin_prepare(&source, options, guard.clone()) {
            log::error!("{} - Exception: {}", handle, e);
            {
                let mut sessions = self.sessions.lock();
                if sessions
                    .get(&handle)
                    .map_or(false, |current| Arc::ptr_eq(current, &session))
                {
                    sessions.remove(&handle);
                }
            }
            if let Err(release_err) = session.release() {
                log::error!("{} - Failed to release player: {}", handle, release_err);
            }
            guard.fire(Err(e));
        }
    }

    /// Non-owning lookup
    pub fn get(&self, handle: i32) -> Option<SessionRef> {
        self.sessions.lock().get(&handle).cloned()
    }

    /// Unregister without releasing
    pub fn remove(&self, handle: i32) -> Option<SessionRef> {
        self.sessions.lock().remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Registered handles, in ascending order
    pub fn handles(&self) -> Vec<i32> {
        let mut handles: Vec<i32> = self.sessions.lock().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Tear down every session. Failures are logged and the drain continues.
    pub fn drain_all(&self) {
        let drained: Vec<SessionRef> = {
            let mut sessions = self.sessions.lock();
            sessions.drain().map(|(_, session)| session).collect()
        };
        log::info!("Releasing {} players", drained.len());

        for session in drained {
            if let Err(e) = session.shutdown() {
                log::error!("{} - Failed to release player: {}", session.handle(), e);
            }
        }
    }

    fn with_session<F>(&self, handle: i32, verb: &str, f: F) -> Result<()>
    where
        F: FnOnce(&PlayerSession) -> Result<()>,
    {
        match self.get(handle) {
            Some(session) => f(&session),
            None => {
                log::warn!("{} - {} ignored, undefined player", handle, verb);
                Ok(())
            }
        }
    }

    /// Start playback. Unlike the other verbs a miss is reported.
    pub fn play(&self, handle: i32, on_end: Option<CompletionCallback>) -> Result<()> {
        let session = self
            .get(handle)
            .ok_or(SoundError::SessionNotFound(handle))?;
        session.play(on_end)
    }

    pub fn pause(&self, handle: i32) -> Result<()> {
        self.with_session(handle, "pause", |s| s.pause())
    }

    pub fn stop(&self, handle: i32) -> Result<()> {
        self.with_session(handle, "stop", |s| s.stop())
    }

    pub fn reset(&self, handle: i32) -> Result<()> {
        self.with_session(handle, "reset", |s| s.reset())
    }

    /// Unregister and release. A later `get(handle)` misses.
    pub fn release(&self, handle: i32) -> Result<()> {
        match self.remove(handle) {
            Some(session) => session.release(),
            None => {
                log::warn!("{} - release ignored, undefined player", handle);
                Ok(())
            }
        }
    }

    pub fn set_volume(&self, handle: i32, left: f32, right: f32) -> Result<()> {
        self.with_session(handle, "setVolume", |s| s.set_volume(left, right))
    }

    pub fn set_looping(&self, handle: i32, looping: bool) -> Result<()> {
        self.with_session(handle, "setLooping", |s| s.set_looping(looping))
    }

    pub fn set_speed(&self, handle: i32, rate: f32) -> Result<()> {
        self.with_session(handle, "setSpeed", |s| s.set_speed(rate))
    }

    pub fn seek(&self, handle: i32, position_ms: u64) -> Result<()> {
        self.with_session(handle, "setCurrentTime", |s| s.seek(position_ms))
    }

    pub fn set_error_callback<F>(&self, handle: i32, on_error: F)
    where
        F: FnOnce(SoundError) + Send + 'static,
    {
        match self.get(handle) {
            Some(session) => session.set_error_callback(on_error),
            None => log::warn!("{} - setErrorCallback ignored, undefined player", handle),
        }
    }

    /// Position in milliseconds, -1 on miss
    pub fn get_position(&self, handle: i32) -> i64 {
        self.get(handle).map_or(-1, |s| s.position())
    }

    pub fn is_playing(&self, handle: i32) -> bool {
        self.get(handle).map_or(false, |s| s.is_playing())
    }

    /// Duration in milliseconds, -1 on miss or before prepare
    pub fn get_duration(&self, handle: i32) -> i64 {
        self.get(handle).map_or(-1, |s| s.duration())
    }

    pub fn get_state(&self, handle: i32) -> Option<SessionState> {
        self.get(handle).map(|s| s.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvent;
    use crate::testing::{EngineCall, ScriptedEngineFactory, StaticCatalog};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const URL: &str = "https://example.com/a.mp3";

    fn registry() -> (SessionRegistry, Arc<ScriptedEngineFactory>) {
        let factory = ScriptedEngineFactory::new();
        let resolver = DataSourceResolver::new(Arc::new(StaticCatalog::new(["beep"])));
        (SessionRegistry::new(factory.clone(), resolver), factory)
    }

    fn load(
        registry: &SessionRegistry,
        handle: i32,
        source: &str,
    ) -> mpsc::Receiver<Result<PreparedInfo>> {
        let (tx, rx) = mpsc::channel();
        registry.create(handle, source, &PlayerOptions::default(), move |result| {
            let _ = tx.send(result);
        });
        rx
    }

    #[test]
    fn load_play_pause_release_scenario() {
        let (registry, factory) = registry();
        let loaded = load(&registry, 1, URL);
        assert_eq!(registry.get_state(1), Some(SessionState::Preparing));

        assert!(factory.last().prepared(183_000));
        let info = loaded.try_recv().unwrap().unwrap();
        assert!(info.duration_ms > 0);
        assert_eq!(registry.get_duration(1), 183_000);

        registry.play(1, None).unwrap();
        assert!(registry.is_playing(1));
        registry.pause(1).unwrap();
        assert!(!registry.is_playing(1));

        registry.release(1).unwrap();
        assert!(!registry.is_playing(1));
        assert!(registry.get(1).is_none());
        assert_eq!(factory.last().release_count(), 1);
    }

    #[test]
    fn missing_file_leaves_nothing_registered() {
        let (registry, factory) = registry();
        let loaded = load(&registry, 2, "missing/file.mp3");

        assert_eq!(
            loaded.try_recv().unwrap(),
            Err(SoundError::SourceNotFound("missing/file.mp3".into()))
        );
        assert!(registry.get(2).is_none());
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn release_before_prepared_releases_engine_once() {
        let (registry, factory) = registry();
        let loaded = load(&registry, 3, URL);
        registry.release(3).unwrap();

        let engine = factory.last();
        assert!(engine.emit_late(EngineEvent::Prepared { duration_ms: 500 }));
        assert!(engine.emit_late(EngineEvent::Completed));

        assert_eq!(engine.release_count(), 1);
        assert!(loaded.try_recv().is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_prepare_does_not_touch_reused_handle() {
        let (registry, factory) = registry();
        let _first = load(&registry, 4, URL);
        let old_engine = factory.last();
        let second = load(&registry, 4, "beep");

        assert!(old_engine.emit_late(EngineEvent::Prepared { duration_ms: 10 }));
        assert_eq!(registry.get_state(4), Some(SessionState::Preparing));
        assert!(second.try_recv().is_err());

        factory.last().prepared(20);
        assert_eq!(second.try_recv().unwrap().unwrap().duration_ms, 20);
    }

    #[test]
    fn load_replaces_existing_handle() {
        let (registry, factory) = registry();
        let _first = load(&registry, 5, URL);
        factory.last().prepared(100);
        let first_id = registry.get(5).unwrap().id();

        let _second = load(&registry, 5, "beep");
        assert_eq!(factory.created(), 2);
        assert_eq!(factory.engine(0).release_count(), 1);
        assert_ne!(registry.get(5).unwrap().id(), first_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_reload_releases_prior_session() {
        let (registry, factory) = registry();
        let _first = load(&registry, 6, URL);
        let failed = load(&registry, 6, "missing/file.mp3");

        assert!(failed.try_recv().unwrap().is_err());
        assert_eq!(factory.engine(0).release_count(), 1);
        assert!(registry.get(6).is_none());
    }

    #[test]
    fn engine_setup_failure_reaches_load_continuation() {
        let (registry, factory) = registry();
        factory.fail_next_create();
        let loaded = load(&registry, 7, URL);
        assert!(matches!(loaded.try_recv().unwrap(), Err(SoundError::Platform(_))));
        assert!(registry.get(7).is_none());

        factory.fail_next_source();
        let loaded = load(&registry, 7, URL);
        assert!(loaded.try_recv().unwrap().is_err());
        assert!(registry.get(7).is_none());
        assert_eq!(factory.last().release_count(), 1);
    }

    #[test]
    fn prepare_error_fails_load() {
        let (registry, factory) = registry();
        let loaded = load(&registry, 8, URL);
        factory.last().fail(1, -1004);

        assert_eq!(
            loaded.try_recv().unwrap(),
            Err(SoundError::Engine {
                code: 1,
                extra: -1004
            })
        );
        assert_eq!(registry.get_state(8), Some(SessionState::Failed));
    }

    #[test]
    fn unknown_handles_follow_miss_policy() {
        let (registry, _) = registry();
        registry.pause(99).unwrap();
        registry.stop(99).unwrap();
        registry.reset(99).unwrap();
        registry.release(99).unwrap();
        registry.set_volume(99, 0.5, 0.5).unwrap();
        registry.set_looping(99, true).unwrap();
        registry.set_speed(99, 2.0).unwrap();
        registry.seek(99, 1000).unwrap();
        registry.set_error_callback(99, |_| {});

        assert_eq!(registry.get_position(99), -1);
        assert_eq!(registry.get_duration(99), -1);
        assert!(!registry.is_playing(99));
        assert_eq!(registry.get_state(99), None);
        assert_eq!(registry.play(99, None), Err(SoundError::SessionNotFound(99)));
    }

    #[test]
    fn unsupported_speed_is_reported() {
        let (registry, factory) = registry();
        factory.set_playback_rate_supported(false);
        let _loaded = load(&registry, 9, URL);
        factory.last().prepared(100);

        assert!(matches!(
            registry.set_speed(9, 1.25),
            Err(SoundError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn completion_from_platform_thread() {
        let (registry, factory) = registry();
        let _loaded = load(&registry, 10, URL);
        let engine = factory.last();
        engine.prepared(100);

        let (tx, rx) = mpsc::channel();
        registry
            .play(
                10,
                Some(Box::new(move || {
                    let _ = tx.send(());
                })),
            )
            .unwrap();

        let platform = engine.clone();
        thread::spawn(move || {
            platform.complete();
            platform.complete();
        })
        .join()
        .unwrap();

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.get_state(10), Some(SessionState::Stopped));
    }

    #[test]
    fn release_races_prepare_notification() {
        for _ in 0..50 {
            let (registry, factory) = registry();
            let _loaded = load(&registry, 11, URL);
            let engine = factory.last();

            let platform = engine.clone();
            let notifier = thread::spawn(move || {
                platform.emit_late(EngineEvent::Prepared { duration_ms: 5 });
            });
            registry.release(11).unwrap();
            notifier.join().unwrap();

            assert_eq!(engine.release_count(), 1);
            assert!(registry.get(11).is_none());
        }
    }

    #[test]
    fn drain_all_shuts_down_every_session() {
        let (registry, factory) = registry();
        for handle in 1..=3 {
            let _ = load(&registry, handle, URL);
            factory.last().prepared(100);
        }
        registry.play(2, None).unwrap();
        assert_eq!(registry.handles(), vec![1, 2, 3]);

        registry.drain_all();

        assert!(registry.is_empty());
        assert_eq!(factory.total_releases(), 3);
        let playing = factory.engine(1).calls();
        assert_eq!(
            &playing[playing.len() - 3..],
            &[EngineCall::Pause, EngineCall::Reset, EngineCall::Release]
        );
    }

    #[test]
    fn drain_all_continues_past_failing_release() {
        let (registry, factory) = registry();
        for handle in 1..=3 {
            if handle == 2 {
                factory.fail_next_release();
            }
            let _ = load(&registry, handle, URL);
            factory.last().prepared(100);
        }
        registry.play(1, None).unwrap();
        registry.play(3, None).unwrap();

        registry.drain_all();

        assert!(registry.is_empty());
        for index in 0..3 {
            let engine = factory.engine(index);
            assert_eq!(engine.release_count(), 1, "engine {}", index);
            assert_eq!(engine.count(&EngineCall::Reset), 1, "engine {}", index);
        }
        assert_eq!(registry.get_state(2), None);
    }

    #[test]
    fn play_in_unplayable_states_is_a_no_op() {
        let (registry, factory) = registry();
        let _loaded = load(&registry, 12, URL);
        let engine = factory.last();
        assert_eq!(registry.play(12, None), Ok(()));
        assert_eq!(registry.get_state(12), Some(SessionState::Preparing));

        engine.prepared(100);
        registry.reset(12).unwrap();
        assert_eq!(registry.play(12, None), Ok(()));
        assert_eq!(registry.get_state(12), Some(SessionState::Idle));

        let fetched = registry.get(12).unwrap();
        registry.release(12).unwrap();
        assert_eq!(fetched.play(None), Ok(()));
        assert_eq!(engine.count(&EngineCall::Start), 0);
        assert_eq!(registry.play(12, None), Err(SoundError::SessionNotFound(12)));
    }
}
