pub mod controller;
pub mod joints;
pub mod loop_worker;
pub mod source;
pub mod synthetic;

pub use controller::PoseController;
pub use joints::{JointName, JointObservation, JointPoint, PoseFrame};
pub use source::{ChannelPoseSource, JsonLinesPoseSource, PoseSource};
pub use synthetic::{SyntheticConfig, SyntheticPoseSource};
