// Session lifecycle states

use crate::error::{Result, SoundError};

/// Player session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing loaded
    Idle,
    /// Source set, waiting for the engine to finish preparing
    Preparing,
    /// Engine is ready to play
    Prepared,
    /// Audio is currently playing
    Playing,
    /// Audio is paused
    Paused,
    /// Stopped or reached the end of the stream
    Stopped,
    /// Preparation failed
    Failed,
    /// Engine released, session is gone
    Released,
}

impl SessionState {
    /// Numeric code used across the C ABI
    pub fn code(self) -> i32 {
        match self {
            SessionState::Idle => 0,
            SessionState::Preparing => 1,
            SessionState::Prepared => 2,
            SessionState::Playing => 3,
            SessionState::Paused => 4,
            SessionState::Stopped => 5,
            SessionState::Failed => 6,
            SessionState::Released => 7,
        }
    }

    /// Seek and rate changes need a prepared engine
    pub fn is_prepared_or_later(self) -> bool {
        matches!(
            self,
            SessionState::Prepared
                | SessionState::Playing
                | SessionState::Paused
                | SessionState::Stopped
        )
    }

    /// States from which `play` starts the engine
    pub fn can_start(self) -> bool {
        matches!(
            self,
            SessionState::Prepared | SessionState::Paused | SessionState::Stopped
        )
    }

    pub fn validate_transition(self, to: SessionState) -> Result<()> {
        match (self, to) {
            // Force-release is always allowed, except twice
            (SessionState::Released, _) => Err(SoundError::InvalidState(
                "Session already released".to_string(),
            )),
            (_, SessionState::Released) => Ok(()),

            // Reset from anywhere
            (_, SessionState::Idle) => Ok(()),

            (SessionState::Idle, SessionState::Preparing) => Ok(()),

            (SessionState::Preparing, SessionState::Prepared) => Ok(()),
            (SessionState::Preparing, SessionState::Failed) => Ok(()),

            (SessionState::Prepared, SessionState::Playing) => Ok(()),

            (SessionState::Playing, SessionState::Paused) => Ok(()),
            (SessionState::Playing, SessionState::Stopped) => Ok(()),

            (SessionState::Paused, SessionState::Playing) => Ok(()),
            (SessionState::Paused, SessionState::Stopped) => Ok(()),

            (SessionState::Stopped, SessionState::Playing) => Ok(()),

            (from, to) => Err(SoundError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_path_is_valid() {
        let path = [
            SessionState::Idle,
            SessionState::Preparing,
            SessionState::Prepared,
            SessionState::Playing,
            SessionState::Paused,
            SessionState::Playing,
            SessionState::Stopped,
            SessionState::Released,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].validate_transition(pair[1]).is_ok(), "{:?}", pair);
        }
    }

    #[test]
    fn play_before_prepare_is_rejected() {
        assert!(SessionState::Preparing
            .validate_transition(SessionState::Playing)
            .is_err());
        assert!(SessionState::Failed
            .validate_transition(SessionState::Playing)
            .is_err());
        assert!(!SessionState::Preparing.can_start());
        assert!(!SessionState::Idle.can_start());
        assert!(!SessionState::Released.can_start());
        assert!(SessionState::Stopped.can_start());
    }

    #[test]
    fn released_is_terminal() {
        assert!(SessionState::Released
            .validate_transition(SessionState::Idle)
            .is_err());
        assert!(SessionState::Preparing
            .validate_transition(SessionState::Released)
            .is_ok());
    }
}
