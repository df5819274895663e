//! Spike strength and pre-spike stability of the history window.
//!
//! A bell strike rises sharply out of a calm room. The recent span is
//! compared against the quiet span right before it, and the quiet span
//! itself has to be both steady and absolutely quiet.

use serde::{Deserialize, Serialize};

use super::history::{mean, HistoryWindow};

/// Spans of the window used for the comparison, counted from the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeSpans {
    /// Quiet span covers `[-quiet_start, -recent_len)`
    pub quiet_start: usize,
    /// Recent span covers the last `recent_len` readings
    pub recent_len: usize,
}

impl Default for SpikeSpans {
    fn default() -> Self {
        Self {
            quiet_start: 15,
            recent_len: 3,
        }
    }
}

/// Result of analysing one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeAnalysis {
    pub avg_quiet: f32,
    pub avg_recent: f32,
    /// `max(0, avg_recent - avg_quiet)`
    pub spike_strength: f32,
    /// Mean squared deviation of the quiet span around its average
    pub variance: f32,
}

impl SpikeAnalysis {
    pub fn is_stable_before_spike(&self, variance_limit: f32) -> bool {
        self.variance < variance_limit
    }

    pub fn was_quiet_before(&self, quiet_ceiling_db: f32) -> bool {
        self.avg_quiet < quiet_ceiling_db
    }
}

/// Analyse the window, or `None` when it does not cover the quiet span yet.
pub fn analyze(history: &HistoryWindow, spans: SpikeSpans) -> Option<SpikeAnalysis> {
    if spans.recent_len == 0 || spans.quiet_start <= spans.recent_len {
        return None;
    }
    if history.len() < spans.quiet_start {
        return None;
    }

    let avg_quiet = mean(history.slice(spans.quiet_start, spans.recent_len));
    let avg_recent = mean(history.slice(spans.recent_len, 0));

    let quiet = history.slice(spans.quiet_start, spans.recent_len);
    let quiet_len = quiet.len() as f32;
    let variance = quiet
        .map(|x| {
            let deviation = x - avg_quiet;
            deviation * deviation
        })
        .sum::<f32>()
        / quiet_len;

    Some(SpikeAnalysis {
        avg_quiet,
        avg_recent,
        spike_strength: (avg_recent - avg_quiet).max(0.0),
        variance,
    })
}
