// Bell Cue Core - acoustic bell strike detection
// Periodic loudness readings -> streaming detector -> trigger sinks

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod presenter;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{BellDetector, DetectionEvent, DetectorMetrics};
pub use config::AppConfig;
pub use engine::ListenerHandle;
pub use error::ListenError;

/// Install the stderr fmt subscriber used by the binaries.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}
