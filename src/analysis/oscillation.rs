//! Direction-change count over the most recent readings.
//!
//! A struck bell rings down with rapid up/down alternation of the level,
//! while a shout of similar loudness holds steady. Counting sign changes of
//! the first difference is a cheap stand-in for brightness. It is a
//! heuristic proxy only, not a frequency estimate.

use super::history::HistoryWindow;

/// Number of sign changes between consecutive first differences.
///
/// Zero differences never count as a change, so constant and monotonic
/// sequences score zero.
pub fn direction_changes<'a>(samples: impl IntoIterator<Item = &'a f32>) -> usize {
    let mut changes = 0;
    let mut prev_sample: Option<f32> = None;
    let mut prev_diff: Option<f32> = None;

    for &sample in samples {
        if let Some(prev) = prev_sample {
            let diff = sample - prev;
            if let Some(last) = prev_diff {
                if (last > 0.0 && diff < 0.0) || (last < 0.0 && diff > 0.0) {
                    changes += 1;
                }
            }
            prev_diff = Some(diff);
        }
        prev_sample = Some(sample);
    }

    changes
}

/// Oscillation score of the last `window` readings.
pub fn oscillation_score(history: &HistoryWindow, window: usize, scale: f32) -> f32 {
    direction_changes(history.slice(window, 0)) as f32 * scale
}
