use crate::pose::{JointName, JointObservation};

use super::config::DetectorConfig;

const REQUIRED_JOINTS: [JointName; 4] = [
    JointName::LeftShoulder,
    JointName::RightShoulder,
    JointName::LeftElbow,
    JointName::RightElbow,
];

/// Last confirmed body position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Arms extended: shoulders clearly above elbows.
    #[default]
    Up,
    /// Arms bent: shoulders close to elbow height.
    Down,
}

/// One completed down-then-up cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepEvent;

/// Edge-triggered push-up detector.
///
/// Feed it one observation per analyzed frame, in order, from a single
/// caller. It reports a rep on every confirmed `Down -> Up` transition.
/// Frames missing any shoulder or elbow are inconclusive and leave the
/// phase untouched.
#[derive(Debug, Clone)]
pub struct RepDetector {
    config: DetectorConfig,
    phase: Phase,
}

impl RepDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            phase: Phase::Up,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Up;
    }

    /// Classifies a complete frame; `None` when a required joint is absent.
    pub fn classify(&self, observation: &JointObservation) -> Option<Phase> {
        let [ls, rs, le, re] = REQUIRED_JOINTS.map(|joint| observation.get(joint));
        let (ls, rs, le, re) = (ls?, rs?, le?, re?);

        let avg_shoulder_y = (ls.y + rs.y) / 2.0;
        let avg_elbow_y = (le.y + re.y) / 2.0;
        let delta = avg_shoulder_y - avg_elbow_y;

        if delta < self.config.down_threshold {
            Some(Phase::Down)
        } else {
            Some(Phase::Up)
        }
    }

    pub fn process(&mut self, observation: &JointObservation) -> Option<RepEvent> {
        let classified = self.classify(observation)?;

        match (self.phase, classified) {
            (Phase::Up, Phase::Down) => {
                self.phase = Phase::Down;
                None
            }
            (Phase::Down, Phase::Up) => {
                self.phase = Phase::Up;
                Some(RepEvent)
            }
            (Phase::Up, Phase::Up) | (Phase::Down, Phase::Down) => None,
        }
    }
}

impl Default for RepDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
