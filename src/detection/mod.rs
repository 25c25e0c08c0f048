pub mod config;
pub mod detector;

pub use config::DetectorConfig;
pub use detector::{Phase, RepDetector, RepEvent};
