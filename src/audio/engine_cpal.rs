//! CPAL-based microphone level source for desktop platforms.
//!
//! The input callback reduces each hardware block to one dBFS reading and
//! hands it to the sampling loop through a lock-free SPSC ring. The callback
//! never allocates or blocks; when the ring is full the reading is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};

use super::level::{linear_to_dbfs, LevelBackend, LevelSource};
use crate::config::SILENCE_FLOOR_DB;
use crate::error::ListenError;

/// Opens the default input device of the default host.
pub struct CpalBackend {
    queue_capacity: usize,
}

impl CpalBackend {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(64)
    }
}

impl LevelBackend for CpalBackend {
    fn check_permission(&self) -> Result<(), ListenError> {
        let host = cpal::default_host();
        host.default_input_device()
            .map(|_| ())
            .ok_or(ListenError::PermissionDenied)
    }

    fn open(&self) -> Result<Box<dyn LevelSource>, ListenError> {
        Ok(Box::new(CpalLevelSource::open(self.queue_capacity)?))
    }
}

pub struct CpalLevelSource {
    stream: Option<cpal::Stream>,
    levels: Consumer<f32>,
    stream_failed: Arc<AtomicBool>,
}

impl CpalLevelSource {
    pub fn open(queue_capacity: usize) -> Result<Self, ListenError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(ListenError::PermissionDenied)?;

        let config = device
            .default_input_config()
            .map_err(|e| ListenError::SessionStartFailure {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = stream_config.channels as usize;

        let (mut producer, consumer) = RingBuffer::<f32>::new(queue_capacity);
        let stream_failed = Arc::new(AtomicBool::new(false));
        let failed_flag = Arc::clone(&stream_failed);
        let err_fn = move |err: cpal::StreamError| {
            tracing::warn!("Input stream error: {}", err);
            failed_flag.store(true, Ordering::Relaxed);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let level = first_channel_level(data.iter().copied(), channels_count);
                    let _ = producer.push(level);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let samples = data.iter().map(|&s| s as f32 / 32768.0);
                    let level = first_channel_level(samples, channels_count);
                    let _ = producer.push(level);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(ListenError::SessionStartFailure {
                    reason: format!("Unsupported input sample format: {:?}", other),
                })
            }
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => ListenError::PermissionDenied,
            other => ListenError::SessionStartFailure {
                reason: format!("{:?}", other),
            },
        })?;

        stream.play().map_err(|e| ListenError::SessionStartFailure {
            reason: format!("Input start failed: {}", e),
        })?;

        tracing::info!(
            "[CpalLevelSource] Input stream started ({} channel(s), {} Hz)",
            channels_count,
            stream_config.sample_rate.0
        );

        Ok(Self {
            stream: Some(stream),
            levels: consumer,
            stream_failed,
        })
    }
}

impl LevelSource for CpalLevelSource {
    fn read_level(&mut self) -> Result<Option<f32>, ListenError> {
        if self.stream.is_none() {
            return Err(ListenError::SampleReadFailure {
                reason: "input stream closed".to_string(),
            });
        }
        if self.stream_failed.swap(false, Ordering::Relaxed) {
            return Err(ListenError::SampleReadFailure {
                reason: "input stream reported an error".to_string(),
            });
        }

        // Only the newest block matters, older ones are stale
        let mut latest = None;
        while let Ok(level) = self.levels.pop() {
            latest = Some(level);
        }
        Ok(latest)
    }

    fn close(&mut self) -> Result<(), ListenError> {
        if let Some(stream) = self.stream.take() {
            stream.pause().map_err(|e| ListenError::StopFailure {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// dBFS level of the first channel of an interleaved block.
fn first_channel_level(samples: impl Iterator<Item = f32>, channels: usize) -> f32 {
    let mut sum_squares = 0.0f64;
    let mut count = 0usize;
    for sample in samples.step_by(channels.max(1)) {
        sum_squares += (sample as f64) * (sample as f64);
        count += 1;
    }
    if count == 0 {
        return SILENCE_FLOOR_DB;
    }
    linear_to_dbfs((sum_squares / count as f64).sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_channel_is_deinterleaved() {
        // Left channel full scale, right channel silent
        let block = [1.0f32, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0, 0.0];
        let level = first_channel_level(block.iter().copied(), 2);
        assert!(level.abs() < 1e-4);
    }

    #[test]
    fn empty_block_is_silence() {
        assert_eq!(
            first_channel_level(std::iter::empty(), 1),
            SILENCE_FLOOR_DB
        );
    }
}
