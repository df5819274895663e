//! Ambient noise floor estimate.
//!
//! Single-pole low-pass over the *oldest* part of the history window, so an
//! ongoing loud event does not leak into the ambient estimate right away.

use super::history::{mean, HistoryWindow};

#[derive(Debug, Clone)]
pub struct BaselineEstimator {
    value: f32,
    default_value: f32,
    smoothing: f32,
    window: usize,
    min_history: usize,
}

impl BaselineEstimator {
    pub fn new(default_value: f32, smoothing: f32, window: usize, min_history: usize) -> Self {
        Self {
            value: default_value,
            default_value,
            smoothing: smoothing.clamp(0.0, 1.0),
            window: window.max(1),
            min_history,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = self.default_value;
    }

    /// Blend the average of the oldest readings into the baseline.
    ///
    /// Returns `false` without touching the estimate while the window holds
    /// fewer than `min_history` readings.
    pub fn update(&mut self, history: &HistoryWindow) -> bool {
        if history.len() < self.min_history {
            return false;
        }
        let ambient = mean(history.oldest(self.window));
        self.value = self.value * self.smoothing + ambient * (1.0 - self.smoothing);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> BaselineEstimator {
        BaselineEstimator::new(-60.0, 0.95, 10, 15)
    }

    #[test]
    fn skips_until_enough_history() {
        let mut baseline = estimator();
        let mut window = HistoryWindow::new(20);
        for _ in 0..14 {
            window.push(-20.0);
        }
        assert!(!baseline.update(&window));
        assert_eq!(baseline.value(), -60.0);
    }

    #[test]
    fn blends_oldest_samples() {
        let mut baseline = estimator();
        let mut window = HistoryWindow::new(20);
        for _ in 0..10 {
            window.push(-40.0);
        }
        // Recent loud readings must not affect the estimate
        for _ in 0..5 {
            window.push(0.0);
        }
        assert!(baseline.update(&window));
        // -60 * 0.95 + -40 * 0.05
        assert!((baseline.value() - (-59.0)).abs() < 1e-4);
    }

    #[test]
    fn converges_towards_ambient_level() {
        let mut baseline = estimator();
        let mut window = HistoryWindow::new(20);
        for _ in 0..20 {
            window.push(-30.0);
        }
        for _ in 0..200 {
            baseline.update(&window);
        }
        assert!((baseline.value() - (-30.0)).abs() < 0.01);
    }

    #[test]
    fn reset_restores_default() {
        let mut baseline = estimator();
        let mut window = HistoryWindow::new(20);
        for _ in 0..15 {
            window.push(-10.0);
        }
        baseline.update(&window);
        assert!(baseline.value() > -60.0);
        baseline.reset();
        assert_eq!(baseline.value(), -60.0);
    }
}
