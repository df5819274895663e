//! Engine module housing the listening session orchestration.
//!
//! `clock` provides the time sources used for detection timestamps and
//! `session` the `ListenerHandle` that owns the sampling loop.

pub mod clock;
pub mod session;

pub use clock::{StubTimeSource, SystemTimeSource, TimeSource};
pub use session::{ListenerHandle, SharedThresholds};
