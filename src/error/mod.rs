// Error types for the bell cue listener
//
// Listening session failures carry a numeric code so the CLI and any
// embedding UI can map them to user-facing messages.

mod listen;

pub use listen::{log_listen_error, ListenError, ListenErrorCodes};

/// Numeric code plus human-readable message for an error value.
pub trait ErrorCode {
    /// Stable numeric code
    fn code(&self) -> i32;

    /// Message suitable for showing to the user
    fn message(&self) -> String;
}
