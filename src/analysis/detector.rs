//! BellDetector - streaming bell strike detection over loudness readings
//!
//! The detector owns the whole session state: history window, baseline,
//! last trigger timestamp and the metrics exposed for tuning. One reading is
//! fed per sampling tick:
//!
//! 1. Push the reading into the history window (skipped when there is none)
//! 2. Once the window holds enough history, update the baseline
//! 3. Analyse spike strength/stability and the oscillation score
//! 4. Evaluate the decision gate; on fire, clear the window so a fresh quiet
//!    period has to form before the next detection

use serde::{Deserialize, Serialize};

use super::baseline::BaselineEstimator;
use super::gate::{DecisionGate, GateInputs, GateVerdict, Thresholds};
use super::history::HistoryWindow;
use super::oscillation::oscillation_score;
use super::spike::{analyze, SpikeSpans};
use crate::config::{DetectorConfig, SILENCE_FLOOR_DB};

/// Clamp a raw reading into the reportable loudness range.
pub fn loudness_sample(db: f32) -> f32 {
    if db.is_nan() {
        SILENCE_FLOOR_DB
    } else {
        db.max(SILENCE_FLOOR_DB)
    }
}

/// A bell strike accepted by the decision gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Milliseconds since the listening session started
    pub timestamp_ms: u64,
    pub level_db: f32,
    pub spike_strength: f32,
    pub oscillation_score: f32,
    pub baseline_db: f32,
}

/// Read-only values for display and threshold tuning.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectorMetrics {
    pub audio_level: f32,
    pub spike_strength: f32,
    pub oscillation_score: f32,
    pub baseline: f32,
}

pub struct BellDetector {
    config: DetectorConfig,
    history: HistoryWindow,
    baseline: BaselineEstimator,
    gate: DecisionGate,
    spans: SpikeSpans,
    last_trigger_ms: Option<u64>,
    metrics: DetectorMetrics,
    last_verdict: Option<GateVerdict>,
    listening: bool,
}

impl BellDetector {
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    /// Create a detector with explicit parameters.
    ///
    /// Window sizes are widened where needed so the quiet span always fits in
    /// the history window.
    pub fn with_config(config: DetectorConfig) -> Self {
        let recent_len = config.recent_len.max(1);
        let quiet_start = config.quiet_span_start.max(recent_len + 1);
        let min_history = config.min_history.max(quiet_start);
        let history_capacity = config
            .history_capacity
            .max(min_history)
            .max(config.oscillation_window);

        let baseline = BaselineEstimator::new(
            config.default_baseline_db,
            config.baseline_smoothing,
            config.baseline_window,
            min_history,
        );
        let gate = DecisionGate::from_config(&config);

        Self {
            history: HistoryWindow::new(history_capacity),
            baseline,
            gate,
            spans: SpikeSpans {
                quiet_start,
                recent_len,
            },
            last_trigger_ms: None,
            metrics: DetectorMetrics {
                baseline: config.default_baseline_db,
                ..DetectorMetrics::default()
            },
            last_verdict: None,
            listening: false,
            config: DetectorConfig {
                history_capacity,
                min_history,
                quiet_span_start: quiet_start,
                recent_len,
                ..config
            },
        }
    }

    /// Begin a listening session with fresh state. No-op while listening.
    pub fn start(&mut self) {
        if self.listening {
            return;
        }
        self.reset_state();
        self.listening = true;
    }

    /// End the listening session and drop all accumulated state.
    /// No-op when not listening.
    pub fn stop(&mut self) {
        if !self.listening {
            return;
        }
        self.listening = false;
        self.reset_state();
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    fn reset_state(&mut self) {
        self.history.clear();
        self.baseline.reset();
        self.last_trigger_ms = None;
        self.last_verdict = None;
        self.metrics = DetectorMetrics {
            baseline: self.baseline.value(),
            ..DetectorMetrics::default()
        };
    }

    /// Feed one sampling tick.
    ///
    /// `reading` is `None` when the level source had no value this tick; the
    /// tick is then skipped without touching the accumulated history.
    pub fn tick(&mut self, reading: Option<f32>, now_ms: u64) -> Option<DetectionEvent> {
        if !self.listening {
            return None;
        }
        let level = loudness_sample(reading?);

        self.history.push(level);
        self.metrics.audio_level = level;

        if self.history.len() < self.config.min_history {
            return None;
        }

        self.baseline.update(&self.history);
        self.metrics.baseline = self.baseline.value();

        let spike = analyze(&self.history, self.spans)?;
        let oscillation = oscillation_score(
            &self.history,
            self.config.oscillation_window,
            self.config.oscillation_scale,
        );
        self.metrics.spike_strength = spike.spike_strength;
        self.metrics.oscillation_score = oscillation;

        let verdict = self.gate.evaluate(&GateInputs {
            now_ms,
            current_level: level,
            baseline: self.baseline.value(),
            spike: &spike,
            oscillation_score: oscillation,
            last_trigger_ms: self.last_trigger_ms,
        });
        self.last_verdict = Some(verdict);

        match verdict {
            GateVerdict::Fire => {
                self.last_trigger_ms = Some(now_ms);
                self.history.clear();
                Some(DetectionEvent {
                    timestamp_ms: now_ms,
                    level_db: level,
                    spike_strength: spike.spike_strength,
                    oscillation_score: oscillation,
                    baseline_db: self.baseline.value(),
                })
            }
            GateVerdict::Reject(reason) => {
                tracing::trace!(
                    "[BellDetector] rejected at {}ms: {:?} (level {:.1}, spike {:.1}, osc {:.0})",
                    now_ms,
                    reason,
                    level,
                    spike.spike_strength,
                    oscillation
                );
                None
            }
        }
    }

    pub fn metrics(&self) -> DetectorMetrics {
        self.metrics
    }

    /// Verdict of the most recent gate evaluation, if any ran this session.
    pub fn last_verdict(&self) -> Option<GateVerdict> {
        self.last_verdict
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn baseline(&self) -> f32 {
        self.baseline.value()
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    pub fn thresholds(&self) -> Thresholds {
        self.gate.thresholds()
    }

    /// Replace both thresholds; used to apply values tuned elsewhere.
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.gate.set_thresholds(thresholds);
    }

    /// Clamped to [10, 60]; effective from the next tick.
    pub fn set_spike_threshold(&mut self, value: f32) -> f32 {
        self.gate.thresholds_mut().set_spike(value)
    }

    /// Clamped to [5, 60]; effective from the next tick.
    pub fn set_frequency_threshold(&mut self, value: f32) -> f32 {
        self.gate.thresholds_mut().set_frequency(value)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Default for BellDetector {
    fn default() -> Self {
        Self::new()
    }
}
