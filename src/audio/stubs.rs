//! Scripted level backend for desktop testing
//!
//! Replays a fixed sequence of readings instead of recording, so listener
//! sessions can run deterministically without audio hardware. Failure modes
//! (denied permission, failed open, failed close) are switched on per backend
//! and every open/close call is counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::level::{LevelBackend, LevelSource};
use crate::error::ListenError;

/// One scripted sampling tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedReading {
    Level(f32),
    /// Recording not ready, no value this tick
    Missing,
    /// The read itself fails
    ReadError,
}

#[derive(Default)]
pub struct ScriptedBackend {
    script: Vec<ScriptedReading>,
    permission_denied: bool,
    fail_open: bool,
    fail_close: bool,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptedReading>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn from_levels(levels: &[f32]) -> Self {
        Self::new(levels.iter().map(|&db| ScriptedReading::Level(db)).collect())
    }

    pub fn deny_permission(mut self) -> Self {
        self.permission_denied = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Number of sources opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of close attempts, failed ones included.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl LevelBackend for ScriptedBackend {
    fn check_permission(&self) -> Result<(), ListenError> {
        if self.permission_denied {
            return Err(ListenError::PermissionDenied);
        }
        Ok(())
    }

    fn open(&self) -> Result<Box<dyn LevelSource>, ListenError> {
        if self.fail_open {
            return Err(ListenError::SessionStartFailure {
                reason: "scripted open failure".to_string(),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedLevelSource {
            readings: self.script.iter().copied().collect(),
            fail_close: self.fail_close,
            closes: Arc::clone(&self.closes),
        }))
    }
}

/// Source returned by [`ScriptedBackend::open`]. Yields `Ok(None)` once the
/// script is exhausted.
pub struct ScriptedLevelSource {
    readings: VecDeque<ScriptedReading>,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

impl LevelSource for ScriptedLevelSource {
    fn read_level(&mut self) -> Result<Option<f32>, ListenError> {
        match self.readings.pop_front() {
            Some(ScriptedReading::Level(db)) => Ok(Some(db)),
            Some(ScriptedReading::Missing) | None => Ok(None),
            Some(ScriptedReading::ReadError) => Err(ListenError::SampleReadFailure {
                reason: "scripted read failure".to_string(),
            }),
        }
    }

    fn close(&mut self) -> Result<(), ListenError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ListenError::StopFailure {
                reason: "scripted close failure".to_string(),
            });
        }
        Ok(())
    }
}
