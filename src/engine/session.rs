//! ListenerHandle: owns one listening session at a time.
//!
//! A session is a dedicated worker thread driving a current-thread Tokio
//! runtime. Each interval tick reads one level from the source, feeds the
//! detector and fans accepted detections out to the trigger sink, the
//! broadcast channel and telemetry. The worker is the only writer of detector
//! state; thresholds come in through atomics and metrics go out through a
//! `RwLock` snapshot.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::clock::{SystemTimeSource, TimeSource};
use crate::analysis::{BellDetector, DetectionEvent, DetectorMetrics, Thresholds};
use crate::audio::{LevelBackend, LevelSource};
use crate::config::{AppConfig, DetectorConfig};
use crate::error::{log_listen_error, ListenError};
use crate::presenter::TriggerSink;
use crate::telemetry::{self, DiagnosticError, LifecyclePhase};

const DETECTION_CHANNEL_CAPACITY: usize = 32;

/// Thresholds shared between the UI side and the sampling loop.
///
/// Values are stored as `f32` bit patterns; writers clamp before storing.
pub struct SharedThresholds {
    spike: AtomicU32,
    frequency: AtomicU32,
}

impl SharedThresholds {
    pub fn new(initial: Thresholds) -> Self {
        Self {
            spike: AtomicU32::new(initial.spike.to_bits()),
            frequency: AtomicU32::new(initial.frequency.to_bits()),
        }
    }

    pub fn load(&self) -> Thresholds {
        Thresholds::new(
            f32::from_bits(self.spike.load(Ordering::Acquire)),
            f32::from_bits(self.frequency.load(Ordering::Acquire)),
        )
    }

    pub fn set_spike(&self, value: f32) -> f32 {
        let applied = self.load().set_spike(value);
        self.spike.store(applied.to_bits(), Ordering::Release);
        applied
    }

    pub fn set_frequency(&self, value: f32) -> f32 {
        let applied = self.load().set_frequency(value);
        self.frequency.store(applied.to_bits(), Ordering::Release);
        applied
    }
}

/// Owns the level source for the lifetime of a session and releases it on
/// every exit path.
struct SourceGuard {
    source: Option<Box<dyn LevelSource>>,
}

impl SourceGuard {
    fn new(source: Box<dyn LevelSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    fn read_level(&mut self) -> Result<Option<f32>, ListenError> {
        match self.source.as_mut() {
            Some(source) => source.read_level(),
            None => Err(ListenError::SampleReadFailure {
                reason: "level source already closed".to_string(),
            }),
        }
    }

    fn close(&mut self) -> Result<(), ListenError> {
        match self.source.take() {
            Some(mut source) => source.close(),
            None => Ok(()),
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log_listen_error(&err, "SourceGuard::drop");
        }
    }
}

struct SessionWorker {
    shutdown: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Everything the sampling thread needs, moved onto it at spawn.
struct WorkerContext {
    detector_config: DetectorConfig,
    tick: Duration,
    backend: Arc<dyn LevelBackend>,
    sink: Arc<dyn TriggerSink>,
    time_source: Arc<dyn TimeSource>,
    thresholds: Arc<SharedThresholds>,
    metrics: Arc<RwLock<DetectorMetrics>>,
    detections_tx: broadcast::Sender<DetectionEvent>,
    shutdown: Arc<AtomicBool>,
}

pub struct ListenerHandle {
    config: AppConfig,
    backend: Arc<dyn LevelBackend>,
    sink: Arc<dyn TriggerSink>,
    time_source: Arc<dyn TimeSource>,
    thresholds: Arc<SharedThresholds>,
    metrics: Arc<RwLock<DetectorMetrics>>,
    detections_tx: broadcast::Sender<DetectionEvent>,
    worker: Mutex<Option<SessionWorker>>,
}

impl ListenerHandle {
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn LevelBackend>,
        sink: Arc<dyn TriggerSink>,
    ) -> Self {
        let thresholds = Thresholds::new(
            config.detector.spike_threshold,
            config.detector.frequency_threshold,
        );
        let metrics = idle_metrics(&config.detector);
        let (detections_tx, _) = broadcast::channel(DETECTION_CHANNEL_CAPACITY);

        Self {
            config,
            backend,
            sink,
            time_source: Arc::new(SystemTimeSource::default()),
            thresholds: Arc::new(SharedThresholds::new(thresholds)),
            metrics: Arc::new(RwLock::new(metrics)),
            detections_tx,
            worker: Mutex::new(None),
        }
    }

    /// Replace the clock used for detection timestamps.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Begin listening. No-op when a session is already running.
    ///
    /// # Errors
    /// * `PermissionDenied` - no microphone access; nothing is created
    /// * `SessionStartFailure` - the source or runtime failed to initialise
    pub fn start(&self) -> Result<(), ListenError> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| ListenError::LockPoisoned {
                component: "listener worker".to_string(),
            })?;
        if worker.is_some() {
            tracing::debug!("[ListenerHandle] start ignored, already listening");
            return Ok(());
        }

        if let Err(err) = self.backend.check_permission() {
            log_listen_error(&err, "ListenerHandle::start");
            let hub = telemetry::hub();
            hub.record_lifecycle(LifecyclePhase::PermissionDenied);
            hub.record_error(DiagnosticError::Permission, err.to_string());
            return Err(err);
        }

        self.reset_metrics();

        let shutdown = Arc::new(AtomicBool::new(false));
        let ctx = WorkerContext {
            detector_config: self.config.detector.clone(),
            tick: Duration::from_millis(self.config.sampling.tick_ms.max(1)),
            backend: Arc::clone(&self.backend),
            sink: Arc::clone(&self.sink),
            time_source: Arc::clone(&self.time_source),
            thresholds: Arc::clone(&self.thresholds),
            metrics: Arc::clone(&self.metrics),
            detections_tx: self.detections_tx.clone(),
            shutdown: Arc::clone(&shutdown),
        };

        let (ready_tx, ready_rx) = std_mpsc::channel();
        let join = std::thread::Builder::new()
            .name("bell-listener".to_string())
            .spawn(move || run_session(ctx, ready_tx))
            .map_err(|e| ListenError::SessionStartFailure {
                reason: format!("Failed to spawn sampling thread: {}", e),
            });

        let startup = join.and_then(|join| match ready_rx.recv() {
            Ok(Ok(())) => Ok(join),
            Ok(Err(err)) => {
                let _ = join.join();
                Err(err)
            }
            Err(_) => {
                let _ = join.join();
                Err(ListenError::SessionStartFailure {
                    reason: "sampling thread exited during startup".to_string(),
                })
            }
        });

        match startup {
            Ok(join) => {
                *worker = Some(SessionWorker { shutdown, join });
                telemetry::hub().record_lifecycle(LifecyclePhase::Started);
                tracing::info!(
                    "[ListenerHandle] listening (tick {}ms)",
                    self.config.sampling.tick_ms
                );
                Ok(())
            }
            Err(err) => {
                log_listen_error(&err, "ListenerHandle::start");
                let hub = telemetry::hub();
                hub.record_lifecycle(LifecyclePhase::StartFailed);
                hub.record_error(DiagnosticError::SessionStart, err.to_string());
                self.reset_metrics();
                Err(err)
            }
        }
    }

    /// Stop listening and release the recording resource. No-op when idle.
    ///
    /// Waits for the in-flight tick to finish. A failure to release the
    /// source is logged and recorded, the stop still completes.
    pub fn stop(&self) {
        let worker = {
            let mut guard = self.worker.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        let Some(worker) = worker else {
            tracing::debug!("[ListenerHandle] stop ignored, not listening");
            return;
        };

        worker.shutdown.store(true, Ordering::SeqCst);
        if worker.join.join().is_err() {
            tracing::error!("[ListenerHandle] sampling thread panicked");
        }

        self.reset_metrics();
        telemetry::hub().record_lifecycle(LifecyclePhase::Stopped);
        tracing::info!("[ListenerHandle] stopped");
    }

    pub fn is_listening(&self) -> bool {
        self.worker
            .lock()
            .map(|worker| worker.is_some())
            .unwrap_or(false)
    }

    /// Latest detector metrics, reset to idle values outside a session.
    pub fn metrics(&self) -> DetectorMetrics {
        *self.metrics.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds.load()
    }

    /// Returns the applied value, clamped to [10, 60]. Takes effect on the
    /// next tick.
    pub fn set_spike_threshold(&self, value: f32) -> f32 {
        let applied = self.thresholds.set_spike(value);
        tracing::debug!("[ListenerHandle] spike threshold -> {}", applied);
        applied
    }

    /// Returns the applied value, clamped to [5, 60]. Takes effect on the
    /// next tick.
    pub fn set_frequency_threshold(&self, value: f32) -> f32 {
        let applied = self.thresholds.set_frequency(value);
        tracing::debug!("[ListenerHandle] frequency threshold -> {}", applied);
        applied
    }

    pub fn subscribe_detections(&self) -> broadcast::Receiver<DetectionEvent> {
        self.detections_tx.subscribe()
    }

    /// Detections as a stream; events missed by a lagging consumer are skipped.
    pub fn detection_stream(&self) -> impl Stream<Item = DetectionEvent> + Send + 'static {
        BroadcastStream::new(self.detections_tx.subscribe()).filter_map(|item| item.ok())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn reset_metrics(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        *metrics = idle_metrics(&self.config.detector);
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn idle_metrics(config: &DetectorConfig) -> DetectorMetrics {
    DetectorMetrics {
        baseline: config.default_baseline_db,
        ..DetectorMetrics::default()
    }
}

fn run_session(ctx: WorkerContext, ready_tx: std_mpsc::Sender<Result<(), ListenError>>) {
    let rt = match Builder::new_current_thread().enable_time().build() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready_tx.send(Err(ListenError::SessionStartFailure {
                reason: format!("Failed to create Tokio runtime: {}", e),
            }));
            return;
        }
    };

    let mut source = match ctx.backend.open() {
        Ok(source) => SourceGuard::new(source),
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    let mut detector = BellDetector::with_config(ctx.detector_config.clone());
    detector.set_thresholds(ctx.thresholds.load());
    detector.start();
    let session_start = ctx.time_source.now();

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    rt.block_on(async {
        let mut interval = tokio::time::interval(ctx.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if ctx.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let thresholds = ctx.thresholds.load();
            if thresholds != detector.thresholds() {
                detector.set_thresholds(thresholds);
            }

            let now_ms = ctx
                .time_source
                .now()
                .saturating_duration_since(session_start)
                .as_millis() as u64;

            let reading = match source.read_level() {
                Ok(reading) => reading,
                Err(err) => {
                    tracing::trace!("[ListenerHandle] tick at {}ms skipped: {}", now_ms, err);
                    continue;
                }
            };

            let detection = detector.tick(reading, now_ms);
            {
                let mut metrics = ctx.metrics.write().unwrap_or_else(|e| e.into_inner());
                *metrics = detector.metrics();
            }

            if let Some(event) = detection {
                tracing::info!(
                    "[ListenerHandle] bell at {}ms (level {:.1} dB, spike {:.1}, osc {:.0})",
                    event.timestamp_ms,
                    event.level_db,
                    event.spike_strength,
                    event.oscillation_score
                );
                telemetry::hub().record_detection(&event);
                ctx.sink.on_detection_event(&event);
                let _ = ctx.detections_tx.send(event);
            }
        }
    });

    detector.stop();
    if let Err(err) = source.close() {
        log_listen_error(&err, "ListenerHandle::stop");
        telemetry::hub().record_error(DiagnosticError::StopFailure, err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_thresholds_clamp_on_write() {
        let shared = SharedThresholds::new(Thresholds::new(25.0, 30.0));
        assert_eq!(shared.set_spike(100.0), 60.0);
        assert_eq!(shared.set_frequency(1.0), 5.0);
        assert_eq!(shared.load(), Thresholds::new(60.0, 5.0));
    }

    #[test]
    fn shared_thresholds_keep_unclamped_initial_values() {
        let shared = SharedThresholds::new(Thresholds::new(25.0, 0.0));
        assert_eq!(shared.load().frequency, 0.0);
        assert_eq!(shared.set_spike(40.0), 40.0);
        assert_eq!(shared.load().frequency, 0.0);
    }

    struct FailingClose;

    impl LevelSource for FailingClose {
        fn read_level(&mut self) -> Result<Option<f32>, ListenError> {
            Ok(None)
        }

        fn close(&mut self) -> Result<(), ListenError> {
            Err(ListenError::StopFailure {
                reason: "busy".to_string(),
            })
        }
    }

    #[test]
    fn source_guard_closes_once() {
        let mut guard = SourceGuard::new(Box::new(FailingClose));
        assert!(guard.close().is_err());
        assert!(guard.close().is_ok());
        assert!(matches!(
            guard.read_level(),
            Err(ListenError::SampleReadFailure { .. })
        ));
    }
}
