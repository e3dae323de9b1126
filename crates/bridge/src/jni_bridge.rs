// JNI bindings for Android/JVM
//
// Entry points of `com.soundbridge.NativeSound`. Callback objects are pinned as
// global references and invoked after attaching the calling thread to the VM.
//
// Java cannot install the module. The host Rust crate must call
// `sound_bridge::install` (typically from `JNI_OnLoad`) before the first
// native call; until then every entry point returns STATUS_NOT_INSTALLED.

use crate::module::with_module;
use crate::record::{to_code, ErrorRecord};
use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jboolean, jfloat, jint, jlong, JNI_FALSE, JNI_TRUE};
use jni::{JNIEnv, JavaVM};
use sound_core::FocusResult;

/// Java object called back from native threads
struct JavaCallback {
    vm: JavaVM,
    target: GlobalRef,
}

impl JavaCallback {
    /// `None` for a null object
    fn new(env: &mut JNIEnv, target: &JObject) -> Result<Option<Self>, ErrorRecord> {
        if target.is_null() {
            return Ok(None);
        }
        let to_record = |e: jni::errors::Error| ErrorRecord::invalid_argument(e.to_string());
        Ok(Some(Self {
            vm: env.get_java_vm().map_err(to_record)?,
            target: env.new_global_ref(target).map_err(to_record)?,
        }))
    }

    fn invoke<F>(&self, method: &str, f: F)
    where
        F: FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<()>,
    {
        let mut env = match self.vm.attach_current_thread() {
            Ok(env) => env,
            Err(e) => {
                log::error!("Failed to attach thread for {}: {}", method, e);
                return;
            }
        };
        if let Err(e) = f(&mut *env, self.target.as_obj()) {
            log::error!("Failed to invoke {}: {}", method, e);
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_describe();
                let _ = env.exception_clear();
            }
        }
    }

    /// `void method(String)`; `None` passes null
    fn call_with_string(&self, method: &str, value: Option<&str>) {
        self.invoke(method, |env, target| {
            let arg = match value {
                Some(value) => JObject::from(env.new_string(value)?),
                None => JObject::null(),
            };
            env.call_method(target, method, "(Ljava/lang/String;)V", &[JValue::Object(&arg)])?;
            Ok(())
        });
    }

    /// `void onLoaded(String error, long durationMs)`
    fn on_loaded(&self, error: Option<&str>, duration_ms: i64) {
        self.invoke("onLoaded", |env, target| {
            let arg = match error {
                Some(error) => JObject::from(env.new_string(error)?),
                None => JObject::null(),
            };
            env.call_method(
                target,
                "onLoaded",
                "(Ljava/lang/String;J)V",
                &[JValue::Object(&arg), JValue::Long(duration_ms)],
            )?;
            Ok(())
        });
    }

    /// `void onEnd()`
    fn on_end(&self) {
        self.invoke("onEnd", |env, target| {
            env.call_method(target, "onEnd", "()V", &[])?;
            Ok(())
        });
    }
}

fn jstring_to_string(env: &mut JNIEnv, jstr: &JString) -> Result<String, ErrorRecord> {
    if jstr.is_null() {
        return Ok(String::new());
    }
    let java_str = env
        .get_string(jstr)
        .map_err(|e| ErrorRecord::invalid_argument(e.to_string()))?;
    Ok(java_str.into())
}

fn to_jboolean(value: bool) -> jboolean {
    if value {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeLoad(
    mut env: JNIEnv,
    _class: JClass,
    handle: jint,
    source: JString,
    options: JString,
    callback: JObject,
) -> jint {
    let result = (|| -> Result<(), ErrorRecord> {
        let source = jstring_to_string(&mut env, &source)?;
        let options = jstring_to_string(&mut env, &options)?;
        let callback = JavaCallback::new(&mut env, &callback)?;
        with_module(|m| {
            m.load(handle, &source, &options, move |result| {
                let Some(callback) = callback else { return };
                match result {
                    Ok(info) => callback.on_loaded(None, info.duration_ms),
                    Err(err) => callback.on_loaded(Some(&err.to_json()), -1),
                }
            });
            Ok(())
        })
    })();
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeLoadFile(
    mut env: JNIEnv,
    _class: JClass,
    handle: jint,
    file_name: JString,
    base_path: JString,
    options: JString,
    callback: JObject,
) -> jint {
    let result = (|| -> Result<(), ErrorRecord> {
        let file_name = jstring_to_string(&mut env, &file_name)?;
        let base_path = jstring_to_string(&mut env, &base_path)?;
        let options = jstring_to_string(&mut env, &options)?;
        let callback = JavaCallback::new(&mut env, &callback)?;
        let base_path = Some(base_path.as_str()).filter(|b| !b.is_empty());
        with_module(|m| {
            m.load_file(handle, &file_name, base_path, &options, move |result| {
                let Some(callback) = callback else { return };
                match result {
                    Ok(info) => callback.on_loaded(None, info.duration_ms),
                    Err(err) => callback.on_loaded(Some(&err.to_json()), -1),
                }
            });
            Ok(())
        })
    })();
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativePlay(
    mut env: JNIEnv,
    _class: JClass,
    handle: jint,
    on_end: JObject,
) -> jint {
    let result = JavaCallback::new(&mut env, &on_end).and_then(|callback| {
        let on_end = callback.map(|callback| move || callback.on_end());
        with_module(|m| m.play(handle, on_end))
    });
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativePause(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jint {
    to_code(with_module(|m| m.pause(handle))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeStop(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jint {
    to_code(with_module(|m| m.stop(handle))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeReset(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jint {
    to_code(with_module(|m| m.reset(handle))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeRelease(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jint {
    to_code(with_module(|m| m.release(handle))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetVolume(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
    left: jfloat,
    right: jfloat,
) -> jint {
    to_code(with_module(|m| m.set_volume(handle, left, right))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetLooping(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
    looping: jboolean,
) -> jint {
    to_code(with_module(|m| m.set_looping(handle, looping != JNI_FALSE))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetSpeed(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
    rate: jfloat,
) -> jint {
    to_code(with_module(|m| m.set_speed(handle, rate))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetCurrentTime(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
    position_ms: jlong,
) -> jint {
    to_code(with_module(|m| m.set_current_time(handle, position_ms))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetErrorCallback(
    mut env: JNIEnv,
    _class: JClass,
    handle: jint,
    callback: JObject,
) -> jint {
    let result = JavaCallback::new(&mut env, &callback).and_then(|callback| {
        let callback =
            callback.ok_or_else(|| ErrorRecord::invalid_argument("error callback is null"))?;
        with_module(|m| {
            m.set_error_callback(handle, move |err| {
                callback.call_with_string("onError", Some(&err.to_json()))
            });
            Ok(())
        })
    });
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeGetCurrentTime(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jlong {
    with_module(|m| Ok(m.get_current_time(handle))).unwrap_or(-1)
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeGetDuration(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jlong {
    with_module(|m| Ok(m.get_duration(handle))).unwrap_or(-1)
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeIsPlaying(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jboolean {
    to_jboolean(with_module(|m| Ok(m.is_playing(handle))).unwrap_or(false))
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeGetState(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
) -> jint {
    with_module(|m| Ok(m.get_state(handle)))
        .ok()
        .flatten()
        .map(|state| state.code())
        .unwrap_or(-1)
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeRequestAudioFocus(
    mut env: JNIEnv,
    _class: JClass,
    options: JString,
) -> jint {
    let result = jstring_to_string(&mut env, &options)
        .and_then(|options| with_module(|m| m.request_audio_focus(&options)));
    match result {
        Ok(FocusResult::Granted) => 1,
        Ok(FocusResult::Delayed) => 2,
        Ok(FocusResult::Failed) => 0,
        Err(err) => {
            log::error!("JNI error: {}", err);
            err.status()
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeAbandonAudioFocus(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    to_code(with_module(|m| m.abandon_audio_focus())) as jint
}

/// Listener receives `onAudioFocusChange(String)` with "gain", "loss",
/// "lossTransient" or "lossTransientCanDuck"
#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetAudioFocusListener(
    mut env: JNIEnv,
    _class: JClass,
    listener: JObject,
) -> jint {
    let result = JavaCallback::new(&mut env, &listener).and_then(|listener| {
        let listener = listener.map(|listener| {
            move |change: sound_core::FocusChange| {
                listener.call_with_string("onAudioFocusChange", Some(change.as_str()))
            }
        });
        with_module(|m| {
            m.set_audio_focus_listener(listener);
            Ok(())
        })
    });
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeGetSystemVolume(
    mut env: JNIEnv,
    _class: JClass,
    options: JString,
) -> jfloat {
    let result = jstring_to_string(&mut env, &options)
        .and_then(|options| with_module(|m| m.get_system_volume(&options)));
    match result {
        Ok(value) => value,
        Err(err) => {
            log::error!("JNI error: {}", err);
            -1.0
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetSystemVolume(
    mut env: JNIEnv,
    _class: JClass,
    value: jfloat,
    options: JString,
) -> jint {
    let result = jstring_to_string(&mut env, &options)
        .and_then(|options| with_module(|m| m.set_system_volume(value, &options)));
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetMute(
    _env: JNIEnv,
    _class: JClass,
    muted: jboolean,
) -> jint {
    to_code(with_module(|m| m.set_mute(muted != JNI_FALSE))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetSpeakerphoneOn(
    _env: JNIEnv,
    _class: JClass,
    handle: jint,
    on: jboolean,
) -> jint {
    to_code(with_module(|m| m.set_speakerphone_on(handle, on != JNI_FALSE))) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeSetVolumeControlStream(
    mut env: JNIEnv,
    _class: JClass,
    options: JString,
) -> jint {
    let result = jstring_to_string(&mut env, &options)
        .and_then(|options| with_module(|m| m.set_volume_control_stream(&options)));
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeResetVolumeControlStream(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    to_code(with_module(|m| m.reset_volume_control_stream())) as jint
}

#[no_mangle]
pub extern "system" fn Java_com_soundbridge_NativeSound_nativeShutdown(
    _env: JNIEnv,
    _class: JClass,
) {
    crate::module::shutdown();
}
