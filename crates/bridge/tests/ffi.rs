// End-to-end tests over the C ABI

use parking_lot::Mutex;
use serial_test::serial;
use sound_bridge::ffi::*;
use sound_bridge::record::*;
use sound_bridge::{install, shutdown, Platform};
use sound_core::testing::{FakePlatform, ScriptedEngineFactory, StaticCatalog};
use sound_core::VolumeChannel;
use std::ffi::{c_void, CString};
use std::ptr;
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct Recorder {
    loads: Mutex<Vec<(i32, i64)>>,
    ends: Mutex<usize>,
    errors: Mutex<Vec<(i32, i32, i32)>>,
    focus: Mutex<Vec<i32>>,
}

impl Recorder {
    fn as_ptr(&self) -> *mut c_void {
        self as *const Recorder as *mut c_void
    }
}

fn recorder<'a>(user_data: *mut c_void) -> &'a Recorder {
    unsafe { &*(user_data as *const Recorder) }
}

extern "C" fn on_loaded(user_data: *mut c_void, status: i32, duration_ms: i64) {
    recorder(user_data).loads.lock().push((status, duration_ms));
}

extern "C" fn on_end(user_data: *mut c_void) {
    *recorder(user_data).ends.lock() += 1;
}

extern "C" fn on_error(user_data: *mut c_void, status: i32, what: i32, extra: i32) {
    recorder(user_data).errors.lock().push((status, what, extra));
}

extern "C" fn on_focus(user_data: *mut c_void, change: i32) {
    recorder(user_data).focus.lock().push(change);
}

fn setup() -> (Arc<ScriptedEngineFactory>, Arc<FakePlatform>) {
    let engines = ScriptedEngineFactory::new();
    let audio = FakePlatform::new();
    install(Platform::new(
        engines.clone(),
        audio.clone(),
        Arc::new(StaticCatalog::new(["beep"])),
    ));
    (engines, audio)
}

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

#[test]
#[serial]
fn load_play_pause_release() {
    let (engines, _) = setup();
    let rec = Recorder::default();
    let url = c("https://example.com/a.mp3");

    assert_eq!(
        sound_load(1, url.as_ptr(), ptr::null(), Some(on_loaded), rec.as_ptr()),
        STATUS_OK
    );
    assert_eq!(sound_get_state(1), 1);
    engines.last().prepared(183_000);
    assert_eq!(*rec.loads.lock(), vec![(STATUS_OK, 183_000)]);
    assert_eq!(sound_get_duration(1), 183_000);

    assert_eq!(sound_play(1, Some(on_end), rec.as_ptr()), STATUS_OK);
    assert!(sound_is_playing(1));
    assert_eq!(sound_pause(1), STATUS_OK);
    assert!(!sound_is_playing(1));

    assert_eq!(sound_release(1), STATUS_OK);
    assert!(!sound_is_playing(1));
    assert_eq!(sound_get_state(1), -1);
    assert_eq!(engines.last().release_count(), 1);

    shutdown();
}

#[test]
#[serial]
fn missing_source_reports_through_callback() {
    let (engines, _) = setup();
    let rec = Recorder::default();
    let missing = c("missing/file.mp3");

    assert_eq!(
        sound_load(2, missing.as_ptr(), ptr::null(), Some(on_loaded), rec.as_ptr()),
        STATUS_OK
    );
    assert_eq!(*rec.loads.lock(), vec![(STATUS_SOURCE_NOT_FOUND, -1)]);
    assert_eq!(sound_get_state(2), -1);
    assert_eq!(engines.created(), 0);

    shutdown();
}

#[test]
#[serial]
fn completion_arrives_from_engine_thread() {
    let (engines, _) = setup();
    let rec = Recorder::default();
    let beep = c("beep");

    sound_load(3, beep.as_ptr(), ptr::null(), Some(on_loaded), rec.as_ptr());
    let engine = engines.last();
    engine.prepared(500);
    sound_play(3, Some(on_end), rec.as_ptr());
    sound_play(3, Some(on_end), rec.as_ptr());

    let platform = engine.clone();
    thread::spawn(move || {
        platform.complete();
        platform.complete();
    })
    .join()
    .unwrap();

    assert_eq!(*rec.ends.lock(), 1);
    assert_eq!(sound_get_state(3), 5);

    shutdown();
}

#[test]
#[serial]
fn engine_errors_reach_error_callback() {
    let (engines, _) = setup();
    let rec = Recorder::default();
    let beep = c("beep");

    sound_load(4, beep.as_ptr(), ptr::null(), None, ptr::null_mut());
    engines.last().prepared(100);
    assert_eq!(
        sound_set_error_callback(4, Some(on_error), rec.as_ptr()),
        STATUS_OK
    );
    sound_play(4, None, ptr::null_mut());
    engines.last().fail(1, -1004);
    engines.last().fail(1, -1004);

    assert_eq!(*rec.errors.lock(), vec![(STATUS_ENGINE_ERROR, 1, -1004)]);
    assert_eq!(sound_set_error_callback(4, None, ptr::null_mut()), STATUS_INVALID_ARGUMENT);

    shutdown();
}

#[test]
#[serial]
fn unknown_handles_are_tolerated() {
    setup();

    assert_eq!(sound_pause(42), STATUS_OK);
    assert_eq!(sound_stop(42), STATUS_OK);
    assert_eq!(sound_reset(42), STATUS_OK);
    assert_eq!(sound_release(42), STATUS_OK);
    assert_eq!(sound_set_volume(42, 0.3, 0.3), STATUS_OK);
    assert_eq!(sound_set_looping(42, true), STATUS_OK);
    assert_eq!(sound_set_speed(42, 1.5), STATUS_OK);
    assert_eq!(sound_seek(42, 1000), STATUS_OK);
    assert_eq!(sound_set_speakerphone_on(42, true), STATUS_OK);
    assert_eq!(sound_get_position(42), -1);
    assert_eq!(sound_get_duration(42), -1);
    assert!(!sound_is_playing(42));
    assert_eq!(sound_play(42, None, ptr::null_mut()), STATUS_SESSION_NOT_FOUND);

    shutdown();
}

#[test]
#[serial]
fn focus_and_volume() {
    let (_, audio) = setup();
    let rec = Recorder::default();
    let alarm = c(r#"{"useAlarmChannel":true,"audioFocusType":"gainTransient"}"#);

    assert_eq!(sound_set_audio_focus_listener(Some(on_focus), rec.as_ptr()), STATUS_OK);
    assert_eq!(sound_request_audio_focus(alarm.as_ptr()), 1);
    audio.emit_focus_change(-2);
    audio.emit_focus_change(1);
    assert_eq!(*rec.focus.lock(), vec![-2, 1]);

    assert_eq!(sound_abandon_audio_focus(), STATUS_OK);
    assert!(audio.snapshot().outstanding.is_empty());

    assert_eq!(sound_set_system_volume(1.0, alarm.as_ptr()), STATUS_OK);
    assert_eq!(audio.snapshot().volumes[&VolumeChannel::Alarm], 7);
    assert_eq!(sound_get_system_volume(alarm.as_ptr()), 1.0);

    assert_eq!(sound_set_mute(true), STATUS_OK);
    assert_eq!(sound_set_volume_control_stream(alarm.as_ptr()), STATUS_OK);
    audio.configure(|s| s.has_activity = false);
    assert_eq!(sound_reset_volume_control_stream(), STATUS_NO_ACTIVITY);

    let bad = c("{\"audioFocusType\":7}");
    assert_eq!(sound_request_audio_focus(bad.as_ptr()), STATUS_INVALID_OPTIONS);

    shutdown();
}

#[test]
#[serial]
fn calls_without_module_fail() {
    shutdown();
    assert_eq!(sound_pause(1), STATUS_NOT_INSTALLED);
    assert_eq!(sound_get_state(1), -1);
    assert_eq!(sound_get_system_volume(ptr::null()), -1.0);
    assert_eq!(sound_load(1, ptr::null(), ptr::null(), None, ptr::null_mut()), STATUS_NOT_INSTALLED);

    setup();
    assert_eq!(
        sound_load(1, ptr::null(), ptr::null(), None, ptr::null_mut()),
        STATUS_INVALID_ARGUMENT
    );
    shutdown();
}

#[test]
#[serial]
fn shutdown_releases_sessions() {
    let (engines, audio) = setup();
    let beep = c("beep");
    for handle in 1..=3 {
        sound_load(handle, beep.as_ptr(), ptr::null(), None, ptr::null_mut());
        engines.last().prepared(100);
    }
    sound_play(2, None, ptr::null_mut());
    sound_request_audio_focus(ptr::null());

    sound_shutdown();

    assert_eq!(engines.total_releases(), 3);
    assert!(audio.snapshot().outstanding.is_empty());
    assert_eq!(sound_get_state(1), -1);
}
