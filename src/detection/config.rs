use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Tunable thresholds for the rep detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConfig {
    /// A frame is "down" when the average shoulder height minus the average
    /// elbow height (normalized units) is strictly below this value.
    /// Smaller values require a deeper lowering before a down is registered.
    pub down_threshold: f64,

    /// Joints reported with a confidence at or below this score are dropped.
    pub min_confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            down_threshold: 0.1,
            min_confidence: 0.3,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.down_threshold.is_finite() {
            bail!("down_threshold must be a finite number");
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            );
        }
        Ok(())
    }
}
