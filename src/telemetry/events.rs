//! Telemetry event types exposed to the CLI and to stream subscribers.

use serde::{Deserialize, Serialize};

/// Listening session lifecycle stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Started,
    Stopped,
    PermissionDenied,
    StartFailed,
}

/// Diagnostic error codes surfaced via telemetry metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    Permission,
    SessionStart,
    StopFailure,
    FixtureLoad,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Detection {
        timestamp_ms: u64,
        level_db: f32,
        spike_strength: f32,
        oscillation_score: f32,
    },
    SessionLifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
