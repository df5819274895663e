// Listening session error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Listen error code constants
///
/// Single source of truth for the numeric codes surfaced to the user.
///
/// Error code range: 1001-1006
pub struct ListenErrorCodes {}

impl ListenErrorCodes {
    /// Microphone access unavailable
    pub const PERMISSION_DENIED: i32 = 1001;

    /// Recording resource failed to initialize
    pub const SESSION_START_FAILURE: i32 = 1002;

    /// A single tick's level read failed
    pub const SAMPLE_READ_FAILURE: i32 = 1003;

    /// Releasing the recording resource failed
    pub const STOP_FAILURE: i32 = 1004;

    /// A listening session is already active
    pub const ALREADY_LISTENING: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;
}

/// Log a listen error with structured context
///
/// Logs the numeric code, the component and the message. Never panics.
pub fn log_listen_error(err: &ListenError, context: &str) {
    error!(
        "Listen error in {}: code={}, component=Listener, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while starting, running or stopping a listening session
///
/// Only `PermissionDenied` and `SessionStartFailure` are surfaced to the
/// user. `SampleReadFailure` is absorbed by the sampling loop and
/// `StopFailure` is logged while the stop itself still completes.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenError {
    /// Microphone permission denied or no input device present
    PermissionDenied,

    /// Failed to open the recording resource
    SessionStartFailure { reason: String },

    /// Reading the current level failed for one tick
    SampleReadFailure { reason: String },

    /// Failed to release the recording resource
    StopFailure { reason: String },

    /// Listening session already active
    AlreadyListening,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ListenError {
    /// Whether this error should be shown to the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            ListenError::PermissionDenied | ListenError::SessionStartFailure { .. }
        )
    }
}

impl ErrorCode for ListenError {
    fn code(&self) -> i32 {
        match self {
            ListenError::PermissionDenied => ListenErrorCodes::PERMISSION_DENIED,
            ListenError::SessionStartFailure { .. } => ListenErrorCodes::SESSION_START_FAILURE,
            ListenError::SampleReadFailure { .. } => ListenErrorCodes::SAMPLE_READ_FAILURE,
            ListenError::StopFailure { .. } => ListenErrorCodes::STOP_FAILURE,
            ListenError::AlreadyListening => ListenErrorCodes::ALREADY_LISTENING,
            ListenError::LockPoisoned { .. } => ListenErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ListenError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access.".to_string()
            }
            ListenError::SessionStartFailure { reason } => {
                format!("Failed to start listening: {}", reason)
            }
            ListenError::SampleReadFailure { reason } => {
                format!("Failed to read audio level: {}", reason)
            }
            ListenError::StopFailure { reason } => {
                format!("Failed to release recording: {}", reason)
            }
            ListenError::AlreadyListening => {
                "Already listening. Call stop() first.".to_string()
            }
            ListenError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for ListenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ListenError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ListenError {}

impl From<std::io::Error> for ListenError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ListenError::PermissionDenied,
            _ => ListenError::SessionStartFailure {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_error_codes() {
        assert_eq!(
            ListenError::PermissionDenied.code(),
            ListenErrorCodes::PERMISSION_DENIED
        );
        assert_eq!(
            ListenError::SessionStartFailure {
                reason: "test".to_string()
            }
            .code(),
            ListenErrorCodes::SESSION_START_FAILURE
        );
        assert_eq!(
            ListenError::SampleReadFailure {
                reason: "test".to_string()
            }
            .code(),
            ListenErrorCodes::SAMPLE_READ_FAILURE
        );
        assert_eq!(
            ListenError::StopFailure {
                reason: "test".to_string()
            }
            .code(),
            ListenErrorCodes::STOP_FAILURE
        );
        assert_eq!(
            ListenError::AlreadyListening.code(),
            ListenErrorCodes::ALREADY_LISTENING
        );
        assert_eq!(
            ListenError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            ListenErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_listen_error_messages() {
        let err = ListenError::PermissionDenied;
        assert!(err.message().contains("permission denied"));

        let err = ListenError::SessionStartFailure {
            reason: "no stream".to_string(),
        };
        assert_eq!(err.message(), "Failed to start listening: no stream");

        let err = ListenError::LockPoisoned {
            component: "Listener".to_string(),
        };
        assert!(err.message().contains("Listener"));
    }

    #[test]
    fn test_listen_error_display() {
        let err = ListenError::AlreadyListening;
        let display = format!("{}", err);
        assert!(display.contains("ListenError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_user_visibility() {
        assert!(ListenError::PermissionDenied.is_user_visible());
        assert!(ListenError::SessionStartFailure {
            reason: "x".to_string()
        }
        .is_user_visible());
        assert!(!ListenError::SampleReadFailure {
            reason: "x".to_string()
        }
        .is_user_visible());
        assert!(!ListenError::StopFailure {
            reason: "x".to_string()
        }
        .is_user_visible());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ListenError::from(io_err), ListenError::PermissionDenied);

        let io_err = std::io::Error::other("device busy");
        match ListenError::from(io_err) {
            ListenError::SessionStartFailure { reason } => {
                assert!(reason.contains("device busy"));
            }
            other => panic!("Expected SessionStartFailure, got {:?}", other),
        }
    }
}
