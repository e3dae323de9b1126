// C ABI over the installed sound module
//
// Status-returning functions use the `STATUS_*` codes from `record`. Callbacks are
// plain function pointers plus an opaque `user_data` pointer passed back verbatim;
// they may run on the engine's thread.

use crate::module::with_module;
use crate::record::{to_code, ErrorRecord, STATUS_INVALID_ARGUMENT, STATUS_OK};
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;

/// Load result: `status`, then the duration in milliseconds (-1 on failure)
pub type SoundLoadCallback = extern "C" fn(user_data: *mut c_void, status: i32, duration_ms: i64);
/// End of playback
pub type SoundCompletionCallback = extern "C" fn(user_data: *mut c_void);
/// Engine error after preparation
pub type SoundErrorCallback = extern "C" fn(user_data: *mut c_void, status: i32, what: i32, extra: i32);
/// Focus change: 1 gain, -1 loss, -2 loss transient, -3 loss transient can duck
pub type SoundFocusCallback = extern "C" fn(user_data: *mut c_void, change: i32);

/// Caller-owned context pointer
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The caller guarantees `user_data` may be used from any thread
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    fn get(self) -> *mut c_void {
        self.0
    }
}

fn read_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, ErrorRecord> {
    if ptr.is_null() {
        return Err(ErrorRecord::invalid_argument(format!("{} is null", name)));
    }
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map_err(|_| ErrorRecord::invalid_argument(format!("{} is not valid UTF-8", name)))
}

/// Optional string: null reads as empty
fn read_opt_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, ErrorRecord> {
    if ptr.is_null() {
        Ok("")
    } else {
        read_str(ptr, name)
    }
}

fn focus_change_code(change: sound_core::FocusChange) -> i32 {
    match change {
        sound_core::FocusChange::Gain => 1,
        sound_core::FocusChange::Loss => -1,
        sound_core::FocusChange::LossTransient => -2,
        sound_core::FocusChange::LossTransientCanDuck => -3,
    }
}

/// Load `source` under `handle`. Returns `STATUS_OK` once the load is under way;
/// the outcome arrives through `callback`.
#[no_mangle]
pub extern "C" fn sound_load(
    handle: i32,
    source: *const c_char,
    options_json: *const c_char,
    callback: Option<SoundLoadCallback>,
    user_data: *mut c_void,
) -> i32 {
    let user_data = UserData(user_data);
    to_code(with_module(|m| {
        let source = read_str(source, "source")?;
        let options = read_opt_str(options_json, "options")?;
        m.load(handle, source, options, move |result| {
            let Some(callback) = callback else { return };
            match result {
                Ok(info) => callback(user_data.get(), STATUS_OK, info.duration_ms),
                Err(err) => callback(user_data.get(), err.status(), -1),
            }
        });
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn sound_play(
    handle: i32,
    on_end: Option<SoundCompletionCallback>,
    user_data: *mut c_void,
) -> i32 {
    let user_data = UserData(user_data);
    let on_end = on_end.map(|callback| move || callback(user_data.get()));
    to_code(with_module(|m| m.play(handle, on_end)))
}

#[no_mangle]
pub extern "C" fn sound_pause(handle: i32) -> i32 {
    to_code(with_module(|m| m.pause(handle)))
}

#[no_mangle]
pub extern "C" fn sound_stop(handle: i32) -> i32 {
    to_code(with_module(|m| m.stop(handle)))
}

#[no_mangle]
pub extern "C" fn sound_reset(handle: i32) -> i32 {
    to_code(with_module(|m| m.reset(handle)))
}

#[no_mangle]
pub extern "C" fn sound_release(handle: i32) -> i32 {
    to_code(with_module(|m| m.release(handle)))
}

#[no_mangle]
pub extern "C" fn sound_set_volume(handle: i32, left: f32, right: f32) -> i32 {
    to_code(with_module(|m| m.set_volume(handle, left, right)))
}

#[no_mangle]
pub extern "C" fn sound_set_looping(handle: i32, looping: bool) -> i32 {
    to_code(with_module(|m| m.set_looping(handle, looping)))
}

#[no_mangle]
pub extern "C" fn sound_set_speed(handle: i32, rate: f32) -> i32 {
    to_code(with_module(|m| m.set_speed(handle, rate)))
}

#[no_mangle]
pub extern "C" fn sound_seek(handle: i32, position_ms: i64) -> i32 {
    to_code(with_module(|m| m.set_current_time(handle, position_ms)))
}

#[no_mangle]
pub extern "C" fn sound_set_error_callback(
    handle: i32,
    callback: Option<SoundErrorCallback>,
    user_data: *mut c_void,
) -> i32 {
    let Some(callback) = callback else {
        return STATUS_INVALID_ARGUMENT;
    };
    let user_data = UserData(user_data);
    to_code(with_module(|m| {
        m.set_error_callback(handle, move |err| {
            callback(
                user_data.get(),
                err.status(),
                err.what.unwrap_or(0),
                err.extra.unwrap_or(0),
            )
        });
        Ok(())
    }))
}

/// Position in milliseconds, -1 for unknown handles
#[no_mangle]
pub extern "C" fn sound_get_position(handle: i32) -> i64 {
    with_module(|m| Ok(m.get_current_time(handle))).unwrap_or(-1)
}

/// Duration in milliseconds, -1 for unknown handles or before prepare
#[no_mangle]
pub extern "C" fn sound_get_duration(handle: i32) -> i64 {
    with_module(|m| Ok(m.get_duration(handle))).unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn sound_is_playing(handle: i32) -> bool {
    with_module(|m| Ok(m.is_playing(handle))).unwrap_or(false)
}

/// Session state code (0 idle .. 7 released), -1 for unknown handles
#[no_mangle]
pub extern "C" fn sound_get_state(handle: i32) -> i32 {
    with_module(|m| Ok(m.get_state(handle)))
        .ok()
        .flatten()
        .map(|state| state.code())
        .unwrap_or(-1)
}

/// 1 granted, 2 delayed, 0 failed, negative status on error
#[no_mangle]
pub extern "C" fn sound_request_audio_focus(options_json: *const c_char) -> i32 {
    let result = with_module(|m| {
        let options = read_opt_str(options_json, "options")?;
        m.request_audio_focus(options)
    });
    match result {
        Ok(sound_core::FocusResult::Granted) => 1,
        Ok(sound_core::FocusResult::Delayed) => 2,
        Ok(sound_core::FocusResult::Failed) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            err.status()
        }
    }
}

#[no_mangle]
pub extern "C" fn sound_abandon_audio_focus() -> i32 {
    to_code(with_module(|m| m.abandon_audio_focus()))
}

/// Install the focus observer; a null callback removes it
#[no_mangle]
pub extern "C" fn sound_set_audio_focus_listener(
    callback: Option<SoundFocusCallback>,
    user_data: *mut c_void,
) -> i32 {
    let user_data = UserData(user_data);
    let listener = callback.map(|callback| {
        move |change| callback(user_data.get(), focus_change_code(change))
    });
    to_code(with_module(|m| {
        m.set_audio_focus_listener(listener);
        Ok(())
    }))
}

/// Volume ratio in 0.0 - 1.0, or -1.0 on failure
#[no_mangle]
pub extern "C" fn sound_get_system_volume(options_json: *const c_char) -> f32 {
    let result = with_module(|m| m.get_system_volume(read_opt_str(options_json, "options")?));
    match result {
        Ok(value) => value,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1.0
        }
    }
}

#[no_mangle]
pub extern "C" fn sound_set_system_volume(value: f32, options_json: *const c_char) -> i32 {
    to_code(with_module(|m| {
        m.set_system_volume(value, read_opt_str(options_json, "options")?)
    }))
}

#[no_mangle]
pub extern "C" fn sound_set_mute(muted: bool) -> i32 {
    to_code(with_module(|m| m.set_mute(muted)))
}

#[no_mangle]
pub extern "C" fn sound_set_speakerphone_on(handle: i32, on: bool) -> i32 {
    to_code(with_module(|m| m.set_speakerphone_on(handle, on)))
}

#[no_mangle]
pub extern "C" fn sound_set_volume_control_stream(options_json: *const c_char) -> i32 {
    to_code(with_module(|m| {
        m.set_volume_control_stream(read_opt_str(options_json, "options")?)
    }))
}

#[no_mangle]
pub extern "C" fn sound_reset_volume_control_stream() -> i32 {
    to_code(with_module(|m| m.reset_volume_control_stream()))
}

/// Release every session and uninstall the module
#[no_mangle]
pub extern "C" fn sound_shutdown() {
    crate::module::shutdown();
}
