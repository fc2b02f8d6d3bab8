pub mod bezier;
pub mod camera;
pub mod motion;
pub mod player;
pub mod static_pose;
pub mod tracks;
mod values;

pub use bezier::BezierEasing;
pub use camera::CameraTrack;
pub use motion::{Motion, MotionBuilder, NamedTracks};
pub use player::MotionPlayer;
pub use static_pose::StaticPose;
pub use tracks::{Bracket, Keyframe, KeyframeTrack};
pub use values::{BoneEasing, BonePose, CameraEasing, CameraPose, Keyframed, MorphPose};
