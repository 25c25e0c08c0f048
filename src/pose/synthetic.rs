//! Scripted push-up motion for demos and pipeline tests.
//!
//! Shoulders move on a cosine between a raised and a lowered height while
//! the elbows stay put, with per-joint jitter and occasional dropped or
//! low-confidence joints the way a real estimator behaves under occlusion.

use std::f64::consts::PI;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::joints::{JointName, JointPoint, PoseFrame};
use super::source::PoseSource;

const ELBOW_Y: f64 = 0.45;
const RAISED_SHOULDER_Y: f64 = 0.75;
const LOWERED_SHOULDER_Y: f64 = 0.47;
const HOLD_FRAMES: u64 = 5;

const OCCLUDABLE: [JointName; 4] = [
    JointName::LeftShoulder,
    JointName::RightShoulder,
    JointName::LeftElbow,
    JointName::RightElbow,
];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Number of reps to perform; `None` keeps going until the consumer stops.
    pub reps: Option<u32>,
    pub frames_per_rep: u32,
    pub frame_interval: Duration,
    /// Maximum absolute noise added to each joint coordinate.
    pub jitter: f64,
    /// Chance that a frame loses one shoulder or elbow.
    pub dropout_probability: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            reps: Some(10),
            frames_per_rep: 30,
            frame_interval: Duration::from_millis(33),
            jitter: 0.005,
            dropout_probability: 0.05,
            seed: 42,
        }
    }
}

pub struct SyntheticPoseSource {
    config: SyntheticConfig,
    rng: StdRng,
    frame_index: u64,
}

impl SyntheticPoseSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.frames_per_rep < 8 {
            bail!("frames_per_rep must be at least 8");
        }
        if !(0.0..=1.0).contains(&config.dropout_probability) {
            bail!("dropout_probability must be within [0, 1]");
        }
        if !(0.0..0.05).contains(&config.jitter) {
            bail!("jitter must be within [0, 0.05)");
        }

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            frame_index: 0,
        })
    }

    fn total_frames(&self) -> Option<u64> {
        self.config
            .reps
            .map(|reps| 2 * HOLD_FRAMES + reps as u64 * self.config.frames_per_rep as u64)
    }

    /// Lowering depth in [0, 1] for the current frame: 0 fully raised.
    fn depth(&self) -> f64 {
        if self.frame_index < HOLD_FRAMES {
            return 0.0;
        }
        let in_motion = self.frame_index - HOLD_FRAMES;
        let frames_per_rep = self.config.frames_per_rep as u64;
        if let Some(reps) = self.config.reps {
            if in_motion >= reps as u64 * frames_per_rep {
                return 0.0;
            }
        }

        let t = (in_motion % frames_per_rep) as f64 / frames_per_rep as f64;
        (1.0 - (2.0 * PI * t).cos()) / 2.0
    }

    fn point(&mut self, x: f64, y: f64) -> JointPoint {
        let jitter = self.config.jitter;
        let mut noisy = |v: f64| {
            let offset = if jitter > 0.0 {
                self.rng.gen_range(-jitter..=jitter)
            } else {
                0.0
            };
            (v + offset).clamp(0.0, 1.0)
        };
        let x = noisy(x);
        let y = noisy(y);
        let confidence = self.rng.gen_range(0.6..0.95);
        JointPoint::new(x, y, confidence)
    }

    fn next_pose(&mut self) -> PoseFrame {
        let shoulder_y =
            RAISED_SHOULDER_Y - self.depth() * (RAISED_SHOULDER_Y - LOWERED_SHOULDER_Y);

        let mut frame = PoseFrame::new()
            .with_joint(JointName::LeftShoulder, self.point(0.35, shoulder_y))
            .with_joint(JointName::RightShoulder, self.point(0.65, shoulder_y))
            .with_joint(JointName::LeftElbow, self.point(0.3, ELBOW_Y))
            .with_joint(JointName::RightElbow, self.point(0.7, ELBOW_Y))
            .with_joint(JointName::LeftWrist, self.point(0.3, 0.2))
            .with_joint(JointName::RightWrist, self.point(0.7, 0.2))
            .with_joint(JointName::Nose, self.point(0.5, (shoulder_y + 0.12).min(1.0)));

        if self.rng.gen_bool(self.config.dropout_probability) {
            let joint = OCCLUDABLE[self.rng.gen_range(0..OCCLUDABLE.len())];
            frame = if self.rng.gen_bool(0.5) {
                frame.without_joint(joint)
            } else {
                let hidden = JointPoint::new(0.5, 0.5, self.rng.gen_range(0.0..0.3));
                frame.with_joint(joint, hidden)
            };
        }

        self.frame_index += 1;
        frame
    }
}

#[async_trait]
impl PoseSource for SyntheticPoseSource {
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        if let Some(total) = self.total_frames() {
            if self.frame_index >= total {
                return Ok(None);
            }
        }

        if !self.config.frame_interval.is_zero() {
            tokio::time::sleep(self.config.frame_interval).await;
        }

        Ok(Some(self.next_pose()))
    }
}
