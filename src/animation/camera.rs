use glam::Vec3;

use crate::animation::tracks::{Bracket, Keyframe, KeyframeTrack};
use crate::animation::values::{CameraEasing, CameraPose, Keyframed};
use crate::math::seconds_to_frame;

/// Keyframed camera motion over absolute frame numbers.
///
/// Two keys no more than one frame apart mark a cut: the camera jumps to the
/// right key instead of sweeping through the gap, so anything sampled
/// between them holds the left key.
#[derive(Debug, Clone, Default)]
pub struct CameraTrack {
    track: KeyframeTrack<CameraPose>,
}

impl CameraTrack {
    #[must_use]
    pub fn new(keys: Vec<Keyframe<CameraPose>>) -> Self {
        Self {
            track: KeyframeTrack::new(keys),
        }
    }

    /// Builds a key from the raw fields stored in a camera motion asset.
    #[must_use]
    pub fn key(
        frame: u32,
        position: Vec3,
        rotation: Vec3,
        focal_length: f32,
        fov: f32,
        orthographic: bool,
        interpolation: &[u8; 24],
    ) -> Keyframe<CameraPose> {
        Keyframe::new(
            frame,
            CameraPose {
                position,
                rotation,
                fov,
                focal_length,
                orthographic,
            },
            CameraEasing::from_quantized(interpolation),
        )
    }

    #[inline]
    #[must_use]
    pub fn track(&self) -> &KeyframeTrack<CameraPose> {
        &self.track
    }

    /// Frame number of the last key.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.track.last_frame()
    }

    /// Samples the camera at a frame position. `None` if there are no keys.
    #[must_use]
    pub fn sample(&self, frame: f32) -> Option<CameraPose> {
        Some(match self.track.bracket(frame)? {
            Bracket::Exact(key) => key.value,
            Bracket::Between { left, right, .. } if right.frame - left.frame <= 1 => left.value,
            Bracket::Between { left, right, t } => CameraPose::blend(&left.value, &right.value, &left.easing, t),
        })
    }

    /// Samples the camera at a time in seconds.
    #[must_use]
    pub fn sample_time(&self, seconds: f64) -> Option<CameraPose> {
        self.sample(seconds_to_frame(seconds))
    }
}
