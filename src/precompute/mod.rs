//! Pose Pre-computation
//!
//! Two ways of taking posing and physics off the render thread:
//!
//! - [`PreCalculator`] computes frames a little ahead of playback on a
//!   background thread, through a bounded queue.
//! - [`PoseCacheGenerator`] bakes a whole motion into a pose cache file,
//!   read back with [`PoseCacheReader`].

pub mod cache;
mod calculator;
mod generator;

pub use cache::{CacheHeader, PoseCacheReader};
pub use calculator::{PoseFrame, PoseSource, PreCalculator, Take};
pub use generator::{GenerateStatus, PoseCacheGenerator};
