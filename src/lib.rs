#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod config;
pub mod errors;
pub mod math;
pub mod physics;
pub mod poser;
pub mod precompute;
pub mod skeleton;

pub use animation::{BezierEasing, BonePose, CameraPose, CameraTrack, KeyframeTrack, Motion, MotionBuilder, MotionPlayer, MorphPose, StaticPose};
pub use config::{GeneratorSettings, PrecomputeSettings};
pub use errors::{MotionError, Result};
pub use physics::{Gravity, NullPhysicsReactor, PhysicsReactor};
pub use poser::{BoneTransform, Poser};
pub use skeleton::{Bone, Morph, MorphKind, Skeleton};
