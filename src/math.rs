//! Shared numeric constants and small matrix helpers.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Tolerance used for every "close enough to zero" decision: linear easing
/// detection, bezier inversion, IK convergence, axis-fix classification and
/// negligible morph rates.
pub const MMD_EPSILON: f32 = 1.0e-6;

/// Motion data is authored at a fixed 30 frames per second.
pub const FRAMES_PER_SECOND: f64 = 30.0;

/// Converts a time in seconds to a (fractional) frame position.
#[inline]
#[must_use]
pub fn seconds_to_frame(seconds: f64) -> f32 {
    (seconds * FRAMES_PER_SECOND) as f32
}

/// Translation part of an affine matrix.
#[inline]
#[must_use]
pub fn translation_of(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}

/// Rotation part of an affine matrix with no scale.
#[inline]
#[must_use]
pub fn rotation_of(m: &Mat4) -> Quat {
    Quat::from_mat3(&Mat3::from_mat4(*m)).normalize()
}

/// `T(translation) * R(rotation)`.
#[inline]
#[must_use]
pub fn rigid(rotation: Quat, translation: Vec3) -> Mat4 {
    Mat4::from_rotation_translation(rotation, translation)
}
