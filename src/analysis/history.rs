//! Sliding history of loudness readings.

use std::collections::vec_deque::Iter;
use std::collections::VecDeque;

/// Fixed-capacity FIFO window of the most recent loudness readings.
///
/// The length never exceeds the capacity; pushing into a full window evicts
/// the oldest reading.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f32) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent reading, if any.
    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    /// Readings at positions `[-from_end, -to_end)` counted from the end.
    ///
    /// `slice(3, 0)` is the last three readings, `slice(15, 3)` the twelve
    /// readings preceding them. Positions outside the window are dropped.
    pub fn slice(&self, from_end: usize, to_end: usize) -> Iter<'_, f32> {
        let len = self.samples.len();
        let start = len.saturating_sub(from_end);
        let end = len.saturating_sub(to_end).max(start);
        self.samples.range(start..end)
    }

    /// The `count` oldest readings in insertion order.
    pub fn oldest(&self, count: usize) -> Iter<'_, f32> {
        self.samples.range(..count.min(self.samples.len()))
    }
}

/// Arithmetic mean of a sequence of readings (0.0 when empty).
pub(crate) fn mean<'a>(values: impl ExactSizeIterator<Item = &'a f32>) -> f32 {
    let count = values.len();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f32>() / count as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(values: &[f32], capacity: usize) -> HistoryWindow {
        let mut window = HistoryWindow::new(capacity);
        for &value in values {
            window.push(value);
        }
        window
    }

    #[test]
    fn push_evicts_oldest_when_full() {
        let window = window_with(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(window.len(), 3);
        let kept: Vec<f32> = window.slice(3, 0).copied().collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
        assert_eq!(window.latest(), Some(5.0));
    }

    #[test]
    fn slice_counts_from_the_end() {
        let values: Vec<f32> = (0..20).map(|i| i as f32).collect();
        let window = window_with(&values, 20);

        let recent: Vec<f32> = window.slice(3, 0).copied().collect();
        assert_eq!(recent, vec![17.0, 18.0, 19.0]);

        let quiet: Vec<f32> = window.slice(15, 3).copied().collect();
        assert_eq!(quiet.len(), 12);
        assert_eq!(quiet.first(), Some(&5.0));
        assert_eq!(quiet.last(), Some(&16.0));
    }

    #[test]
    fn slice_beyond_length_is_truncated() {
        let window = window_with(&[1.0, 2.0], 20);
        assert_eq!(window.slice(15, 3).len(), 0);
        assert_eq!(window.slice(5, 0).len(), 2);
    }

    #[test]
    fn oldest_returns_insertion_order() {
        let window = window_with(&[1.0, 2.0, 3.0, 4.0], 20);
        let oldest: Vec<f32> = window.oldest(2).copied().collect();
        assert_eq!(oldest, vec![1.0, 2.0]);
        assert_eq!(window.oldest(10).len(), 4);
    }

    #[test]
    fn clear_empties_the_window() {
        let mut window = window_with(&[1.0, 2.0, 3.0], 20);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.latest(), None);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        let window = HistoryWindow::new(4);
        assert_eq!(mean(window.slice(3, 0)), 0.0);
        let window = window_with(&[-60.0, -40.0], 4);
        assert_eq!(mean(window.slice(2, 0)), -50.0);
    }
}
