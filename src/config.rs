//! Configuration management for detector tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration on the bell detector without recompilation.
//! Every empirical constant of the decision gate lives here as a default,
//! not as a physical constant.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Lowest reportable loudness; anything quieter (or NaN) is clamped here.
pub const SILENCE_FLOOR_DB: f32 = -160.0;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

/// Bell detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum number of readings kept in the sliding window
    pub history_capacity: usize,
    /// Readings required before the baseline and gate run
    pub min_history: usize,
    /// Number of oldest readings averaged into the baseline
    pub baseline_window: usize,
    /// Weight of the previous baseline in the single-pole filter
    pub baseline_smoothing: f32,
    /// Baseline value on (re)start
    pub default_baseline_db: f32,
    /// Start of the quiet span, counted from the end of the window
    pub quiet_span_start: usize,
    /// Number of most recent readings forming the recent span
    pub recent_len: usize,
    /// Quiet span variance must stay below this
    pub stability_variance_limit: f32,
    /// Quiet span average must stay below this
    pub quiet_ceiling_db: f32,
    /// Current reading must exceed this
    pub absolute_floor_db: f32,
    /// Current reading must exceed the baseline by this much
    pub baseline_margin_db: f32,
    /// Minimum time between two accepted detections
    pub cooldown_ms: u64,
    /// Number of most recent readings inspected for direction changes
    pub oscillation_window: usize,
    /// Multiplier turning a direction-change count into a score
    pub oscillation_scale: f32,
    /// Initial spike threshold
    pub spike_threshold: f32,
    /// Initial oscillation (frequency) threshold
    pub frequency_threshold: f32,
    /// Whether the oscillation score takes part in the decision
    pub frequency_gating: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            min_history: 15,
            baseline_window: 10,
            baseline_smoothing: 0.95,
            default_baseline_db: -60.0,
            quiet_span_start: 15,
            recent_len: 3,
            stability_variance_limit: 50.0,
            quiet_ceiling_db: -40.0,
            absolute_floor_db: -35.0,
            baseline_margin_db: 20.0,
            // Was 2000ms and then 1000ms; the cleared window already debounces
            cooldown_ms: 500,
            oscillation_window: 8,
            oscillation_scale: 10.0,
            spike_threshold: 25.0,
            frequency_threshold: 30.0,
            frequency_gating: true,
        }
    }
}

/// Sampling loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Interval between level reads in milliseconds
    pub tick_ms: u64,
    /// Capacity of the ring between the audio callback and the sampling loop
    pub level_queue_capacity: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            level_queue_capacity: 64,
        }
    }
}

/// Trigger sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Play a confirmation sound after each detection
    pub play_sound: bool,
    /// Probability of the alternate confirmation sound
    pub alternate_sound_probability: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            play_sound: true,
            alternate_sound_probability: 0.01,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or
    /// its JSON is invalid. Missing sections and fields fall back to defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/detector_config.json")
    }
}
