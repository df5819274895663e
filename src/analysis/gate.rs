//! Decision gate combining all detector signals into a single verdict.
//!
//! Every condition has to hold at the same tick. The verdict names the first
//! condition that failed, which is what tuning sessions look at.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::spike::SpikeAnalysis;
use crate::config::DetectorConfig;

/// Allowed range for the user-tunable spike threshold
pub const SPIKE_THRESHOLD_RANGE: RangeInclusive<f32> = 10.0..=60.0;

/// Allowed range for the user-tunable frequency threshold
pub const FREQUENCY_THRESHOLD_RANGE: RangeInclusive<f32> = 5.0..=60.0;

fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        return *range.start();
    }
    value.clamp(*range.start(), *range.end())
}

/// The two user-tunable thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub spike: f32,
    pub frequency: f32,
}

impl Thresholds {
    /// Thresholds taken as-is; only the setters clamp.
    pub fn new(spike: f32, frequency: f32) -> Self {
        Self { spike, frequency }
    }

    /// Set the spike threshold, clamped to [`SPIKE_THRESHOLD_RANGE`].
    pub fn set_spike(&mut self, value: f32) -> f32 {
        self.spike = clamp_to(value, &SPIKE_THRESHOLD_RANGE);
        self.spike
    }

    /// Set the frequency threshold, clamped to [`FREQUENCY_THRESHOLD_RANGE`].
    pub fn set_frequency(&mut self, value: f32) -> f32 {
        self.frequency = clamp_to(value, &FREQUENCY_THRESHOLD_RANGE);
        self.frequency
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        let config = DetectorConfig::default();
        Self::new(config.spike_threshold, config.frequency_threshold)
    }
}

/// First gate condition that did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRejection {
    SpikeTooSmall,
    BelowAbsoluteFloor,
    BelowBaselineMargin,
    CoolingDown,
    UnstableBeforeSpike,
    NotQuietBefore,
    NotOscillating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Fire,
    Reject(GateRejection),
}

impl GateVerdict {
    pub fn is_fire(&self) -> bool {
        matches!(self, GateVerdict::Fire)
    }
}

/// Signals evaluated at one tick.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    pub now_ms: u64,
    pub current_level: f32,
    pub baseline: f32,
    pub spike: &'a SpikeAnalysis,
    pub oscillation_score: f32,
    pub last_trigger_ms: Option<u64>,
}

/// Fixed gate constants plus the tunable thresholds.
#[derive(Debug, Clone)]
pub struct DecisionGate {
    thresholds: Thresholds,
    absolute_floor_db: f32,
    baseline_margin_db: f32,
    cooldown_ms: u64,
    variance_limit: f32,
    quiet_ceiling_db: f32,
    frequency_gating: bool,
}

impl DecisionGate {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            thresholds: Thresholds::new(config.spike_threshold, config.frequency_threshold),
            absolute_floor_db: config.absolute_floor_db,
            baseline_margin_db: config.baseline_margin_db,
            cooldown_ms: config.cooldown_ms,
            variance_limit: config.stability_variance_limit,
            quiet_ceiling_db: config.quiet_ceiling_db,
            frequency_gating: config.frequency_gating,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn thresholds_mut(&mut self) -> &mut Thresholds {
        &mut self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    pub fn evaluate(&self, inputs: &GateInputs<'_>) -> GateVerdict {
        use GateRejection::*;

        if inputs.spike.spike_strength <= self.thresholds.spike {
            return GateVerdict::Reject(SpikeTooSmall);
        }
        if inputs.current_level <= self.absolute_floor_db {
            return GateVerdict::Reject(BelowAbsoluteFloor);
        }
        if inputs.current_level <= inputs.baseline + self.baseline_margin_db {
            return GateVerdict::Reject(BelowBaselineMargin);
        }
        if let Some(last) = inputs.last_trigger_ms {
            if inputs.now_ms.saturating_sub(last) <= self.cooldown_ms {
                return GateVerdict::Reject(CoolingDown);
            }
        }
        if !inputs.spike.is_stable_before_spike(self.variance_limit) {
            return GateVerdict::Reject(UnstableBeforeSpike);
        }
        if !inputs.spike.was_quiet_before(self.quiet_ceiling_db) {
            return GateVerdict::Reject(NotQuietBefore);
        }
        if self.frequency_gating && inputs.oscillation_score < self.thresholds.frequency {
            return GateVerdict::Reject(NotOscillating);
        }

        GateVerdict::Fire
    }
}
