use glam::{Mat4, Quat, Vec3};

use crate::math::{rotation_of, translation_of};
use crate::poser::ik::IkOutcome;
use crate::skeleton::{AppendBone, MaterialValues};

/// Runtime state of one bone, rebuilt every posing pass.
///
/// Keyframe inputs are written by the motion player; morph contributions are
/// accumulated at the start of the pre-physics pass; everything else is
/// derived by the transform pipeline.
#[derive(Debug, Clone)]
pub struct BoneState {
    pub key_translation: Vec3,
    pub key_rotation: Quat,
    pub morph_translation: Vec3,
    pub morph_rotation: Quat,
    pub total_translation: Vec3,
    pub total_rotation: Quat,
    /// Total rotation before the IK delta was applied. Only tracked for IK
    /// links.
    pub pre_ik_rotation: Quat,
    /// Rotation accumulated by the CCD solver for this link.
    pub ik_rotation: Quat,
    /// Rest position relative to the parent's rest position.
    pub local_offset: Vec3,
    /// Model-space transform of the bone.
    pub local_matrix: Mat4,
    /// Translation to the bone's rest position. Maps a skinning matrix back
    /// to a model-space transform: `local = skinning * bind_pose`.
    pub bind_pose: Mat4,
    pub bind_inverse: Mat4,
    /// `local_matrix * bind_inverse`. Physics reactors overwrite it for
    /// simulated bones.
    pub skinning_matrix: Mat4,
    pub ik_link: bool,
    /// Result of the last solve, for bones that own an IK chain.
    pub ik_outcome: Option<IkOutcome>,

    pub(crate) parent: Option<usize>,
    pub(crate) append: Option<AppendBone>,
}

impl BoneState {
    pub(crate) fn new(rest: Vec3, local_offset: Vec3, parent: Option<usize>, append: Option<AppendBone>) -> Self {
        Self {
            key_translation: Vec3::ZERO,
            key_rotation: Quat::IDENTITY,
            morph_translation: Vec3::ZERO,
            morph_rotation: Quat::IDENTITY,
            total_translation: Vec3::ZERO,
            total_rotation: Quat::IDENTITY,
            pre_ik_rotation: Quat::IDENTITY,
            ik_rotation: Quat::IDENTITY,
            local_offset,
            local_matrix: Mat4::IDENTITY,
            bind_pose: Mat4::from_translation(rest),
            bind_inverse: Mat4::from_translation(-rest),
            skinning_matrix: Mat4::IDENTITY,
            ik_link: false,
            ik_outcome: None,
            parent,
            append,
        }
    }

    /// Clears everything derived by the previous pass. Keyframe inputs are
    /// kept.
    pub(crate) fn clear_derived(&mut self) {
        self.morph_translation = Vec3::ZERO;
        self.morph_rotation = Quat::IDENTITY;
        self.total_translation = Vec3::ZERO;
        self.total_rotation = Quat::IDENTITY;
        self.pre_ik_rotation = Quat::IDENTITY;
        self.ik_rotation = Quat::IDENTITY;
        self.local_matrix = Mat4::IDENTITY;
        self.ik_outcome = None;
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn append(&self) -> Option<&AppendBone> {
        self.append.as_ref()
    }

    /// Model-space position of the bone's joint.
    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        translation_of(&self.local_matrix)
    }

    #[inline]
    #[must_use]
    pub fn world_rotation(&self) -> Quat {
        rotation_of(&self.local_matrix)
    }

    #[inline]
    #[must_use]
    pub fn rest_position(&self) -> Vec3 {
        translation_of(&self.bind_pose)
    }

    /// Writes a simulated skinning matrix back and rebuilds the model-space
    /// transform from it, so post-physics children follow the body.
    pub fn set_simulated(&mut self, skinning: Mat4) {
        self.skinning_matrix = skinning;
        self.local_matrix = skinning * self.bind_pose;
    }
}

/// Model-space position and rotation of a posed bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl BoneTransform {
    /// Transform of a bone at `rest` skinned by `skinning`.
    #[must_use]
    pub fn from_skinning(skinning: &Mat4, rest: Vec3) -> Self {
        Self {
            position: skinning.transform_point3(rest),
            rotation: rotation_of(skinning),
        }
    }
}

/// Read from the skinning matrix, so bones written by a physics reactor come
/// out simulated.
impl From<&BoneState> for BoneTransform {
    fn from(state: &BoneState) -> Self {
        Self::from_skinning(&state.skinning_matrix, state.rest_position())
    }
}

/// Multiply and add images of one material, written by material morphs.
///
/// The renderer computes `base * mul + add` per parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialState {
    pub mul: MaterialValues,
    pub add: MaterialValues,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            mul: MaterialValues::splat(1.0),
            add: MaterialValues::splat(0.0),
        }
    }
}
