//! Joint model shared by pose sources and the rep detector.
//!
//! A `PoseFrame` is what an estimator reports, unfiltered and keyed by the
//! estimator's joint names. A `JointObservation` is the filtered view the
//! detector consumes: every joint it contains has a confidence above the
//! configured cutoff and a coordinate inside the unit square.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    Neck,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    Root,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl JointName {
    pub const ALL: [JointName; 19] = [
        JointName::Nose,
        JointName::LeftEye,
        JointName::RightEye,
        JointName::LeftEar,
        JointName::RightEar,
        JointName::Neck,
        JointName::LeftShoulder,
        JointName::RightShoulder,
        JointName::LeftElbow,
        JointName::RightElbow,
        JointName::LeftWrist,
        JointName::RightWrist,
        JointName::Root,
        JointName::LeftHip,
        JointName::RightHip,
        JointName::LeftKnee,
        JointName::RightKnee,
        JointName::LeftAnkle,
        JointName::RightAnkle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JointName::Nose => "nose",
            JointName::LeftEye => "leftEye",
            JointName::RightEye => "rightEye",
            JointName::LeftEar => "leftEar",
            JointName::RightEar => "rightEar",
            JointName::Neck => "neck",
            JointName::LeftShoulder => "leftShoulder",
            JointName::RightShoulder => "rightShoulder",
            JointName::LeftElbow => "leftElbow",
            JointName::RightElbow => "rightElbow",
            JointName::LeftWrist => "leftWrist",
            JointName::RightWrist => "rightWrist",
            JointName::Root => "root",
            JointName::LeftHip => "leftHip",
            JointName::RightHip => "rightHip",
            JointName::LeftKnee => "leftKnee",
            JointName::RightKnee => "rightKnee",
            JointName::LeftAnkle => "leftAnkle",
            JointName::RightAnkle => "rightAnkle",
        }
    }
}

impl FromStr for JointName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        JointName::ALL
            .iter()
            .copied()
            .find(|joint| joint.as_str() == value)
            .ok_or_else(|| anyhow!("unknown joint name '{value}'"))
    }
}

/// A 2D normalized position (origin bottom-left, y grows upward) with the
/// estimator's confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl JointPoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    fn is_usable(&self, min_confidence: f64) -> bool {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        self.confidence.is_finite()
            && self.confidence > min_confidence
            && in_unit(self.x)
            && in_unit(self.y)
    }
}

/// Raw estimator output for one analyzed camera frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    #[serde(default)]
    pub joints: HashMap<String, JointPoint>,
}

impl PoseFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_joint(mut self, joint: JointName, point: JointPoint) -> Self {
        self.joints.insert(joint.as_str().to_string(), point);
        self
    }

    pub fn without_joint(mut self, joint: JointName) -> Self {
        self.joints.remove(joint.as_str());
        self
    }
}

/// Confidence-filtered joints of a single frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointObservation {
    joints: HashMap<JointName, JointPoint>,
}

impl JointObservation {
    /// Keeps only recognised joints whose confidence strictly exceeds
    /// `min_confidence` and whose coordinates lie in [0, 1].
    pub fn from_frame(frame: &PoseFrame, min_confidence: f64) -> Self {
        let joints = frame
            .joints
            .iter()
            .filter(|(_, point)| point.is_usable(min_confidence))
            .filter_map(|(name, point)| {
                name.parse::<JointName>()
                    .ok()
                    .map(|joint| (joint, *point))
            })
            .collect();

        Self { joints }
    }

    pub fn get(&self, joint: JointName) -> Option<&JointPoint> {
        self.joints.get(&joint)
    }
}
