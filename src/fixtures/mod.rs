//! Fixture utilities for the deterministic replay harness.
//!
//! This module discovers fixture assets, loads WAV recordings, reduces them
//! to one loudness reading per sampling tick and replays those readings
//! through a `BellDetector` with synthetic timestamps. Expectation JSON files
//! pin the detections a fixture must produce.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{BellDetector, DetectionEvent};
use crate::audio::block_level_db;
use crate::config::{AppConfig, DetectorConfig};

/// Default location for fixture WAV/JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub wav_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture data with decoded samples of the first channel.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpectations {
    #[serde(default)]
    pub fixture: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub detections: Vec<ExpectedDetection>,
}

impl FixtureExpectations {
    pub fn verify(&self, actual: &[DetectionEvent]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.detections.iter().enumerate() {
            match actual.get(idx) {
                Some(event) => {
                    let delta = (event.timestamp_ms as f32 - expected.offset_ms).abs();
                    if delta > expected.tolerance_ms {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(*event),
                            delta_ms: Some(delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    delta_ms: None,
                }),
            }
        }

        for (idx, event) in actual.iter().enumerate().skip(self.detections.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(*event),
                delta_ms: None,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Expected detection, matched by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedDetection {
    pub offset_ms: f32,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: f32,
}

fn default_tolerance() -> f32 {
    50.0
}

/// Outcome of comparing actual detections with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "delta_ms": failure.delta_ms,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure. `expected` is `None` for an
/// unexpected extra detection.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    pub expected: Option<ExpectedDetection>,
    pub actual: Option<DetectionEvent>,
    pub delta_ms: Option<f32>,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("wav") {
                    fixtures.push(metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load samples + expectations for a fixture name or a WAV path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let wav_path = self.resolve_fixture_path(fixture)?;
        let metadata = metadata_for_path(&wav_path)?;
        let (samples, sample_rate) = read_wav(&wav_path)?;

        let expectation_path = override_expect.or_else(|| metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => Some(load_expectations(&path)?),
            None => None,
        };

        Ok(FixtureData {
            metadata,
            sample_rate,
            samples,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.wav"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn metadata_for_path(wav_path: &Path) -> Result<FixtureMetadata> {
    let name = wav_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid fixture name for {}", wav_path.display()))?
        .to_string();
    let expect_path = wav_path.with_extension("expect.json");
    Ok(FixtureMetadata {
        name,
        wav_path: wav_path.to_path_buf(),
        expect_path: expect_path.exists().then_some(expect_path),
    })
}

pub fn load_expectations(path: &Path) -> Result<FixtureExpectations> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading expectation {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

/// Result of replaying one fixture.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub fixture: String,
    pub tick_ms: u64,
    pub tick_count: usize,
    pub detection_count: usize,
    pub detections: Vec<DetectionEvent>,
}

/// Replays decoded recordings through the detector, one reading per tick.
pub struct FixtureProcessor {
    detector_config: DetectorConfig,
    tick_ms: u64,
}

impl FixtureProcessor {
    pub fn new(app_config: &AppConfig) -> Self {
        Self {
            detector_config: app_config.detector.clone(),
            tick_ms: app_config.sampling.tick_ms.max(1),
        }
    }

    pub fn with_frequency_gating(mut self, enabled: bool) -> Self {
        self.detector_config.frequency_gating = enabled;
        self
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// One dBFS reading per full tick; a trailing partial block is dropped.
    pub fn tick_levels(&self, data: &FixtureData) -> Vec<f32> {
        let block = (data.sample_rate as u64 * self.tick_ms / 1000).max(1) as usize;
        data.samples.chunks_exact(block).map(block_level_db).collect()
    }

    pub fn replay_levels(&self, levels: &[f32]) -> Vec<DetectionEvent> {
        let mut detector = BellDetector::with_config(self.detector_config.clone());
        detector.start();
        levels
            .iter()
            .enumerate()
            .filter_map(|(idx, &level)| detector.tick(Some(level), idx as u64 * self.tick_ms))
            .collect()
    }

    pub fn run(&self, data: &FixtureData) -> ReplayReport {
        let levels = self.tick_levels(data);
        let detections = self.replay_levels(&levels);
        tracing::debug!(
            "[FixtureProcessor] {}: {} ticks, {} detections",
            data.metadata.name,
            levels.len(),
            detections.len()
        );
        ReplayReport {
            fixture: data.metadata.name.clone(),
            tick_ms: self.tick_ms,
            tick_count: levels.len(),
            detection_count: detections.len(),
            detections,
        }
    }
}

/// Decode a WAV file, keeping the first channel only.
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let sample_rate = spec.sample_rate;

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|value| value as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved.into_iter().step_by(channels).collect()
    };

    Ok((samples, sample_rate))
}

#[cfg(test)]
mod tests;
