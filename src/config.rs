//! Pre-computation Settings
//!
//! Plain configuration structs for the background pose pre-calculator and
//! the pose cache generator. Both derive `serde` so hosts can keep them in
//! their own config files.
//!
//! ```rust,ignore
//! use mmd_motion::config::PrecomputeSettings;
//!
//! let settings = PrecomputeSettings {
//!     cache_size: 8,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{MotionError, Result};

/// Default simulation and sampling step: 60 Hz.
pub const DEFAULT_STEP_LENGTH: f32 = 1.0 / 60.0;

fn check_step(name: &str, value: f32) -> Result<()> {
    if value.is_nan() || value <= 0.0 {
        return Err(MotionError::Format(format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PrecomputeSettings
// ---------------------------------------------------------------------------

/// Configuration of a [`PreCalculator`](crate::precompute::PreCalculator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecomputeSettings {
    /// Seconds between two computed frames.
    pub step_length: f32,
    /// Frames computed ahead of the consumer. Zero is treated as one.
    pub cache_size: usize,
    /// Let the producer jump ahead to the time a consumer last missed,
    /// integrating physics across the whole gap in one step.
    pub auto_step_length: bool,
    /// Physics sub-step cap for each produced frame.
    pub max_sub_steps: u32,
}

impl Default for PrecomputeSettings {
    fn default() -> Self {
        Self {
            step_length: DEFAULT_STEP_LENGTH,
            cache_size: 30,
            auto_step_length: true,
            max_sub_steps: 2,
        }
    }
}

impl PrecomputeSettings {
    /// Rejects step lengths the producer could never advance by.
    pub fn validate(&self) -> Result<()> {
        check_step("step_length", self.step_length)
    }
}

// ---------------------------------------------------------------------------
// GeneratorSettings
// ---------------------------------------------------------------------------

/// Configuration of a [`PoseCacheGenerator`](crate::precompute::PoseCacheGenerator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Seconds between two stored frames.
    pub frame_step_length: f32,
    /// Extra seconds simulated after the last key, so physics can settle.
    pub time_after_motion_finish: f32,
    /// Fixed physics step. Never longer than `frame_step_length`.
    pub physics_step_length: f32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            frame_step_length: DEFAULT_STEP_LENGTH,
            time_after_motion_finish: 0.0,
            physics_step_length: DEFAULT_STEP_LENGTH,
        }
    }
}

impl GeneratorSettings {
    /// Rejects zero, negative and NaN step lengths.
    pub fn validate(&self) -> Result<()> {
        check_step("frame_step_length", self.frame_step_length)?;
        check_step("physics_step_length", self.physics_step_length)
    }

    /// Physics step actually used: clamped to the frame step.
    #[must_use]
    pub fn effective_physics_step(&self) -> f32 {
        self.physics_step_length.min(self.frame_step_length)
    }

    /// Physics sub-steps needed to cover one frame step.
    #[must_use]
    pub fn max_sub_steps(&self) -> u32 {
        ((self.frame_step_length / self.effective_physics_step()) as u32).saturating_add(1)
    }
}
