use glam::{Quat, Vec3};

use crate::animation::bezier::BezierEasing;

/// A value that can be keyed on a [`KeyframeTrack`](crate::animation::KeyframeTrack).
///
/// Every keyframe carries one `Easing` describing how each of the value's
/// channels travels towards the next key.
pub trait Keyframed: Clone {
    type Easing: Clone + Default + std::fmt::Debug;

    /// Blends `start` towards `end` at linear parameter `t`, easing each
    /// channel with the curve stored on the start key.
    fn blend(start: &Self, end: &Self, easing: &Self::Easing, t: f32) -> Self;
}

#[inline]
fn lerp(a: f32, b: f32, lambda: f32) -> f32 {
    a * (1.0 - lambda) + b * lambda
}

// ============================================================================
// Bone
// ============================================================================

/// Keyframed local transform of a single bone, relative to its rest pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for BonePose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BonePose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[must_use]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }
}

/// One curve per translation axis plus one shared by the rotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneEasing {
    pub x: BezierEasing,
    pub y: BezierEasing,
    pub z: BezierEasing,
    pub rotation: BezierEasing,
}

impl BoneEasing {
    /// Decodes the four `[x0, y0, x1, y1]` control quads of a bone key, in
    /// x, y, z, rotation order.
    #[must_use]
    pub fn from_quantized(quads: [[u8; 4]; 4]) -> Self {
        let curve = |q: [u8; 4]| BezierEasing::from_quantized(q[0], q[1], q[2], q[3]);
        Self {
            x: curve(quads[0]),
            y: curve(quads[1]),
            z: curve(quads[2]),
            rotation: curve(quads[3]),
        }
    }
}

impl Keyframed for BonePose {
    type Easing = BoneEasing;

    fn blend(start: &Self, end: &Self, easing: &BoneEasing, t: f32) -> Self {
        let translation = Vec3::new(
            lerp(start.translation.x, end.translation.x, easing.x.calculate(t)),
            lerp(start.translation.y, end.translation.y, easing.y.calculate(t)),
            lerp(start.translation.z, end.translation.z, easing.z.calculate(t)),
        );
        let rotation = start.rotation.slerp(end.rotation, easing.rotation.calculate(t));
        Self {
            translation,
            rotation,
        }
    }
}

// ============================================================================
// Morph
// ============================================================================

/// Keyframed weight of one morph.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MorphPose {
    pub weight: f32,
}

impl MorphPose {
    #[must_use]
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }
}

impl Keyframed for MorphPose {
    type Easing = BezierEasing;

    fn blend(start: &Self, end: &Self, easing: &BezierEasing, t: f32) -> Self {
        Self {
            weight: lerp(start.weight, end.weight, easing.calculate(t)),
        }
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Camera state at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Look-at target position.
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Signed distance from the target.
    pub focal_length: f32,
    pub orthographic: bool,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            fov: 30.0,
            focal_length: 0.0,
            orthographic: false,
        }
    }
}

/// Independent curves for the six animated camera channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraEasing {
    pub x: BezierEasing,
    pub y: BezierEasing,
    pub z: BezierEasing,
    pub rotation: BezierEasing,
    pub focal_length: BezierEasing,
    pub fov: BezierEasing,
}

impl CameraEasing {
    /// Decodes the 24 interpolation bytes of a camera key. Channel `i` is
    /// stored as `[x0, x1, y0, y1]` at offset `4 * i`, in x, y, z, rotation,
    /// focal length, fov order.
    #[must_use]
    pub fn from_quantized(bytes: &[u8; 24]) -> Self {
        let curve = |i: usize| {
            let q = &bytes[i * 4..i * 4 + 4];
            BezierEasing::from_quantized(q[0], q[2], q[1], q[3])
        };
        Self {
            x: curve(0),
            y: curve(1),
            z: curve(2),
            rotation: curve(3),
            focal_length: curve(4),
            fov: curve(5),
        }
    }
}

impl Keyframed for CameraPose {
    type Easing = CameraEasing;

    fn blend(start: &Self, end: &Self, easing: &CameraEasing, t: f32) -> Self {
        let r = easing.rotation.calculate(t);
        Self {
            position: Vec3::new(
                lerp(start.position.x, end.position.x, easing.x.calculate(t)),
                lerp(start.position.y, end.position.y, easing.y.calculate(t)),
                lerp(start.position.z, end.position.z, easing.z.calculate(t)),
            ),
            rotation: start.rotation.lerp(end.rotation, r),
            fov: lerp(start.fov, end.fov, easing.fov.calculate(t)),
            focal_length: lerp(start.focal_length, end.focal_length, easing.focal_length.calculate(t)),
            orthographic: start.orthographic,
        }
    }
}
