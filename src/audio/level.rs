//! Level sources: the detector-facing boundary to the recording layer.
//!
//! A source yields one loudness reading in dBFS per sampling tick, or
//! nothing when the recording is not ready yet.

use crate::config::SILENCE_FLOOR_DB;
use crate::error::ListenError;

/// Periodic loudness readings from an active recording.
///
/// Implementations do not need to be `Send`: the sampling loop opens and
/// drives a source on its own thread.
pub trait LevelSource {
    /// Latest reading, `Ok(None)` when no value is available yet.
    fn read_level(&mut self) -> Result<Option<f32>, ListenError>;

    /// Release the recording resource.
    fn close(&mut self) -> Result<(), ListenError>;
}

/// Factory for level sources, one per listening session.
pub trait LevelBackend: Send + Sync {
    /// Check that a recording can be made at all.
    fn check_permission(&self) -> Result<(), ListenError>;

    /// Open a new source. Called on the sampling thread.
    fn open(&self) -> Result<Box<dyn LevelSource>, ListenError>;
}

/// RMS level of a block of samples in dBFS, clamped to the silence floor.
pub fn block_level_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| (sample as f64) * (sample as f64))
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    linear_to_dbfs(rms as f32)
}

/// Convert linear amplitude [0, 1] to dBFS, clamped to the silence floor.
pub fn linear_to_dbfs(linear: f32) -> f32 {
    if linear <= 0.0 || linear.is_nan() {
        SILENCE_FLOOR_DB
    } else {
        (20.0 * linear.log10()).max(SILENCE_FLOOR_DB)
    }
}
