// Audio focus negotiation
// One coordinator per process holds at most one grant and one change observer.
// A new request abandons the held grant before asking the platform again.

use crate::error::{Result, SoundError};
use crate::options::FocusGain;
use crate::platform::{AudioPlatform, FocusRequest, FocusResult, FocusToken};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Logical focus change reported to the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Gain,
    Loss,
    LossTransient,
    LossTransientCanDuck,
}

impl FocusChange {
    /// Map an `AUDIOFOCUS_*` change code
    pub fn from_platform_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(FocusChange::Gain),
            -1 => Some(FocusChange::Loss),
            -2 => Some(FocusChange::LossTransient),
            -3 => Some(FocusChange::LossTransientCanDuck),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusChange::Gain => "gain",
            FocusChange::Loss => "loss",
            FocusChange::LossTransient => "lossTransient",
            FocusChange::LossTransientCanDuck => "lossTransientCanDuck",
        }
    }
}

/// Focus change observer
pub type FocusObserver = Arc<dyn Fn(FocusChange) + Send + Sync>;

/// Currently held focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusGrant {
    pub token: FocusToken,
    pub request: FocusRequest,
}

#[derive(Default)]
struct FocusShared {
    observer: Mutex<Option<FocusObserver>>,
}

/// Handle given to the platform for asynchronous focus changes.
/// Outliving the coordinator is harmless: notifications are then dropped.
#[derive(Clone)]
pub struct FocusChangeSink {
    shared: Weak<FocusShared>,
}

impl FocusChangeSink {
    /// Forward a raw platform code. Unknown codes are logged and dropped.
    pub fn notify(&self, code: i32) {
        match FocusChange::from_platform_code(code) {
            Some(change) => self.dispatch(change),
            None => log::warn!("Unknown audio focus change: {}", code),
        }
    }

    pub fn dispatch(&self, change: FocusChange) {
        let Some(shared) = self.shared.upgrade() else {
            log::debug!("Focus change {} after shutdown", change.as_str());
            return;
        };
        let observer = shared.observer.lock().clone();
        match observer {
            Some(observer) => {
                log::info!("Audio focus changed: {}", change.as_str());
                (*observer)(change);
            }
            None => log::debug!("Focus change {} without observer", change.as_str()),
        }
    }
}

pub struct AudioFocusCoordinator {
    platform: Arc<dyn AudioPlatform>,
    shared: Arc<FocusShared>,
    grant: Mutex<Option<FocusGrant>>,
}

impl AudioFocusCoordinator {
    pub fn new(platform: Arc<dyn AudioPlatform>) -> Self {
        Self {
            platform,
            shared: Arc::new(FocusShared::default()),
            grant: Mutex::new(None),
        }
    }

    /// Request focus, replacing any grant currently held.
    pub fn request_focus(&self, request: FocusRequest) -> Result<FocusResult> {
        let mut grant = self.grant.lock();
        if let Some(held) = grant.take() {
            log::debug!("Replacing held audio focus {:?}", held.token);
            if let Err(e) = self.platform.abandon_focus(held.token) {
                log::error!("Failed to abandon audio focus: {}", e);
            }
        }

        let mut request = request;
        if request.gain == FocusGain::GainTransientExclusive
            && !self.platform.supports_exclusive_focus()
        {
            log::warn!("Exclusive audio focus unsupported, requesting gainTransient");
            request.gain = FocusGain::GainTransient;
        }

        let sink = FocusChangeSink {
            shared: Arc::downgrade(&self.shared),
        };
        let response = match self.platform.request_focus(&request, sink) {
            Ok(response) => response,
            Err(SoundError::Platform(message)) => {
                return Err(SoundError::FocusRequestFailed(message))
            }
            Err(e) => return Err(e),
        };

        let mut result = response.result;
        if result == FocusResult::Delayed && !self.platform.supports_focus_requests() {
            result = FocusResult::Failed;
            if let Err(e) = self.platform.abandon_focus(response.token) {
                log::error!("Failed to abandon audio focus: {}", e);
            }
        }

        if result != FocusResult::Failed {
            *grant = Some(FocusGrant {
                token: response.token,
                request,
            });
        }

        log::info!(
            "Audio focus request ({:?}, {:?}): {}",
            request.channel,
            request.gain,
            result.as_str()
        );
        Ok(result)
    }

    /// Give up the held grant; a no-op when none is held.
    /// The grant stays held when the platform refuses, so a retry can succeed.
    pub fn abandon_focus(&self) -> Result<()> {
        let mut grant = self.grant.lock();
        let Some(held) = *grant else {
            log::debug!("No audio focus to abandon");
            return Ok(());
        };
        self.platform.abandon_focus(held.token)?;
        *grant = None;

        log::info!("Audio focus abandoned");
        Ok(())
    }

    /// Install or clear the single observer. A new observer supersedes the old one.
    pub fn set_focus_change_listener(&self, observer: Option<FocusObserver>) {
        *self.shared.observer.lock() = observer;
    }

    pub fn has_grant(&self) -> bool {
        self.grant.lock().is_some()
    }

    pub fn current_grant(&self) -> Option<FocusGrant> {
        *self.grant.lock()
    }

    /// Drop the observer and abandon any held grant
    pub fn shutdown(&self) {
        self.set_focus_change_listener(None);
        if let Err(e) = self.abandon_focus() {
            log::error!("Failed to abandon audio focus on shutdown: {}", e);
        }
    }
}
