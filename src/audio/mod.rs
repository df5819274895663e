// Audio module - loudness readings from the recording layer

#[cfg(feature = "mic")]
pub mod engine_cpal;
pub mod level;
pub mod stubs;

// Re-export commonly used types for convenience
#[cfg(feature = "mic")]
pub use engine_cpal::{CpalBackend, CpalLevelSource};
pub use level::{block_level_db, linear_to_dbfs, LevelBackend, LevelSource};
pub use stubs::{ScriptedBackend, ScriptedLevelSource, ScriptedReading};
