// Analysis module - bell strike detection over periodic loudness readings
//
// Pipeline per sampling tick:
// HistoryWindow → {BaselineEstimator, spike analysis, oscillation score}
//   → DecisionGate → DetectionEvent
//
// No spectral analysis happens here; the detector only sees one scalar
// loudness reading per tick.

pub mod baseline;
pub mod detector;
pub mod gate;
pub mod history;
pub mod oscillation;
pub mod spike;

pub use detector::{loudness_sample, BellDetector, DetectionEvent, DetectorMetrics};
pub use gate::{
    GateRejection, GateVerdict, Thresholds, FREQUENCY_THRESHOLD_RANGE, SPIKE_THRESHOLD_RANGE,
};
pub use history::HistoryWindow;
