// Error records and status codes crossing the bridge

use serde::Serialize;
use sound_core::SoundError;
use std::fmt;

pub const STATUS_OK: i32 = 0;
pub const STATUS_SOURCE_NOT_FOUND: i32 = -1;
pub const STATUS_INVALID_SOURCE: i32 = -2;
pub const STATUS_ENGINE_ERROR: i32 = -3;
pub const STATUS_UNSUPPORTED_OPERATION: i32 = -4;
pub const STATUS_FOCUS_REQUEST_FAILED: i32 = -5;
pub const STATUS_SESSION_NOT_FOUND: i32 = -6;
pub const STATUS_INVALID_STATE: i32 = -7;
pub const STATUS_PLATFORM_ERROR: i32 = -8;
pub const STATUS_NO_ACTIVITY: i32 = -9;
pub const STATUS_INVALID_OPTIONS: i32 = -10;
/// No module installed
pub const STATUS_NOT_INSTALLED: i32 = -20;
/// Null pointer or malformed string from the caller
pub const STATUS_INVALID_ARGUMENT: i32 = -21;

/// `{code, message}` pair handed to the calling runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub code: &'static str,
    pub message: String,
    #[serde(skip)]
    status: i32,
    /// Engine `what`/`extra` pair, for engine errors only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub what: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<i32>,
}

impl ErrorRecord {
    pub fn not_installed() -> Self {
        Self::new(
            ("not_installed", STATUS_NOT_INSTALLED),
            "Sound module is not installed",
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(("invalid_argument", STATUS_INVALID_ARGUMENT), message)
    }

    fn new((code, status): (&'static str, i32), message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            what: None,
            extra: None,
        }
    }

    /// Integer status for the C ABI
    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"code\":\"{}\",\"message\":\"\"}}", self.code)
        })
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<SoundError> for ErrorRecord {
    fn from(err: SoundError) -> Self {
        let kind = match &err {
            SoundError::SourceNotFound(_) => ("source_not_found", STATUS_SOURCE_NOT_FOUND),
            SoundError::InvalidSource(_) => ("invalid_source", STATUS_INVALID_SOURCE),
            SoundError::Engine { .. } => ("engine_error", STATUS_ENGINE_ERROR),
            SoundError::UnsupportedOperation(_) => {
                ("unsupported_operation", STATUS_UNSUPPORTED_OPERATION)
            }
            SoundError::FocusRequestFailed(_) => {
                ("focus_request_failed", STATUS_FOCUS_REQUEST_FAILED)
            }
            SoundError::SessionNotFound(_) => ("session_not_found", STATUS_SESSION_NOT_FOUND),
            SoundError::InvalidState(_) => ("invalid_state", STATUS_INVALID_STATE),
            SoundError::Platform(_) => ("platform_error", STATUS_PLATFORM_ERROR),
            SoundError::NoActivity => ("no_activity", STATUS_NO_ACTIVITY),
            SoundError::InvalidOptions(_) => ("invalid_options", STATUS_INVALID_OPTIONS),
        };
        let mut record = Self::new(kind, err.to_string());
        if let SoundError::Engine { code, extra } = err {
            record.what = Some(code);
            record.extra = Some(extra);
        }
        record
    }
}

/// Collapse a verb result into a C ABI status, logging failures
pub fn to_code<T>(result: Result<T, ErrorRecord>) -> i32 {
    match result {
        Ok(_) => STATUS_OK,
        Err(err) => {
            log::error!("FFI error: {}", err);
            err.status()
        }
    }
}
