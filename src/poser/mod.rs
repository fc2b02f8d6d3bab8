//! Bone Hierarchy Poser
//!
//! The [`Poser`] owns the mutable runtime image of one skeleton: a
//! [`BoneState`] per bone, morph rates and material morph images. Callers
//! write keyframe poses and morph rates, then run the posing passes:
//!
//! ```text
//! set_bone_pose / set_morph_pose
//!        │
//!        ▼
//! pre_physics_posing()   morphs, then non-physics bones
//!        │
//!        ▼
//! physics reactor        may overwrite skinning matrices of simulated bones
//!        │
//!        ▼
//! post_physics_posing()  bones flagged post-physics
//! ```
//!
//! Bones are evaluated in two fixed buckets sorted by transform level, then
//! by index. Within a bucket each pass completes for every bone before the
//! next pass starts.

mod ik;
mod morph;
mod pipeline;
mod state;

pub use ik::{AxisFix, EulerOrder, IkChain, IkLinkState, IkOutcome, JointLimits, MAX_IK_ITERATIONS, limit_euler};
pub use state::{BoneState, BoneTransform, MaterialState};

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::animation::{BonePose, MorphPose};
use crate::skeleton::Skeleton;

pub struct Poser {
    skeleton: Arc<Skeleton>,
    bones: Vec<BoneState>,
    chains: Vec<Option<IkChain>>,
    morph_rates: Vec<f32>,
    materials: Vec<MaterialState>,
    pre_physics: Vec<usize>,
    post_physics: Vec<usize>,
    bone_names: FxHashMap<String, usize>,
    morph_names: FxHashMap<String, usize>,
}

impl Poser {
    /// Builds the runtime image of `skeleton` and poses it at rest.
    #[must_use]
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let count = skeleton.bones.len();
        let mut bones = Vec::with_capacity(count);
        let mut chains = Vec::with_capacity(count);
        let mut bone_names = FxHashMap::default();

        for (i, bone) in skeleton.bones.iter().enumerate() {
            bone_names.insert(bone.name.clone(), i);

            let parent = bone.parent.filter(|&p| p < count);
            let local_offset = match parent {
                Some(p) => bone.position - skeleton.bones[p].position,
                None => bone.position,
            };
            let append = bone
                .append
                .filter(|a| a.parent < count && (a.rotate || a.translate));
            bones.push(BoneState::new(bone.position, local_offset, parent, append));

            let chain = bone.ik.as_ref().and_then(|ik| {
                let chain = IkChain::new(ik, count);
                if chain.is_none() {
                    log::warn!("IK bone '{}' has an invalid target and is ignored", bone.name);
                }
                chain
            });
            chains.push(chain);
        }

        for chain in chains.iter().flatten() {
            for link in &chain.links {
                bones[link.bone].ik_link = true;
            }
        }

        let (mut post_physics, mut pre_physics): (Vec<usize>, Vec<usize>) =
            (0..count).partition(|&i| skeleton.bones[i].post_physics);
        let by_level = |&i: &usize| (skeleton.bones[i].transform_level, i);
        pre_physics.sort_by_key(by_level);
        post_physics.sort_by_key(by_level);

        let morph_names = skeleton
            .morphs
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();

        log::debug!(
            "Poser for '{}': {} bones ({} post-physics), {} IK chains, {} morphs",
            skeleton.name,
            count,
            post_physics.len(),
            chains.iter().flatten().count(),
            skeleton.morphs.len()
        );

        let mut poser = Self {
            morph_rates: vec![0.0; skeleton.morphs.len()],
            materials: vec![MaterialState::default(); skeleton.material_count],
            skeleton,
            bones,
            chains,
            pre_physics,
            post_physics,
            bone_names,
            morph_names,
        };
        poser.reset_posing();
        poser
    }

    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    #[inline]
    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn morph_index(&self, name: &str) -> Option<usize> {
        self.morph_names.get(name).copied()
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    pub fn set_bone_pose(&mut self, index: usize, pose: BonePose) {
        if let Some(state) = self.bones.get_mut(index) {
            state.key_translation = pose.translation;
            state.key_rotation = pose.rotation;
        }
    }

    /// Returns `false` when the skeleton has no bone of that name.
    pub fn set_bone_pose_by_name(&mut self, name: &str, pose: BonePose) -> bool {
        match self.bone_index(name) {
            Some(index) => {
                self.set_bone_pose(index, pose);
                true
            }
            None => {
                log::debug!("No bone named '{name}' in '{}'", self.skeleton.name);
                false
            }
        }
    }

    pub fn set_morph_pose(&mut self, index: usize, pose: MorphPose) {
        if let Some(rate) = self.morph_rates.get_mut(index) {
            *rate = pose.weight;
        }
    }

    pub fn set_morph_pose_by_name(&mut self, name: &str, pose: MorphPose) -> bool {
        match self.morph_index(name) {
            Some(index) => {
                self.set_morph_pose(index, pose);
                true
            }
            None => {
                log::debug!("No morph named '{name}' in '{}'", self.skeleton.name);
                false
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn morph_rates(&self) -> &[f32] {
        &self.morph_rates
    }

    // ========================================================================
    // Posing passes
    // ========================================================================

    /// Clears keyframe poses and morph rates and poses the rest pose.
    pub fn reset_posing(&mut self) {
        self.morph_rates.fill(0.0);
        for state in &mut self.bones {
            state.key_translation = Vec3::ZERO;
            state.key_rotation = Quat::IDENTITY;
        }
        self.pre_physics_posing(true);
        self.post_physics_posing();
    }

    /// Applies morphs (unless `calculate_morph` is false) and poses every
    /// bone that is not driven by physics.
    pub fn pre_physics_posing(&mut self, calculate_morph: bool) {
        for state in &mut self.bones {
            state.clear_derived();
        }
        self.materials.fill(MaterialState::default());

        if calculate_morph {
            for index in 0..self.morph_rates.len() {
                let rate = self.morph_rates[index];
                morph::apply_morph(&self.skeleton, &mut self.bones, &mut self.materials, index, rate);
            }
        }

        pipeline::update_bucket(&mut self.bones, &self.chains, &self.pre_physics);
    }

    /// Poses the bones evaluated after the physics step.
    pub fn post_physics_posing(&mut self) {
        pipeline::update_bucket(&mut self.bones, &self.chains, &self.post_physics);
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[BoneState] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn bone(&self, index: usize) -> Option<&BoneState> {
        self.bones.get(index)
    }

    /// Mutable access for physics reactors that write simulated bones back.
    #[inline]
    pub fn bone_mut(&mut self, index: usize) -> Option<&mut BoneState> {
        self.bones.get_mut(index)
    }

    #[inline]
    pub fn bones_mut(&mut self) -> &mut [BoneState] {
        &mut self.bones
    }

    #[must_use]
    pub fn skinning_matrix(&self, index: usize) -> Option<Mat4> {
        self.bones.get(index).map(|b| b.skinning_matrix)
    }

    /// Copies every skinning matrix into `out`.
    ///
    /// # Panics
    /// If `out` is not exactly one matrix per bone.
    pub fn copy_skinning_matrices(&self, out: &mut [Mat4]) {
        assert_eq!(out.len(), self.bones.len(), "skinning output must hold one matrix per bone");
        for (dst, state) in out.iter_mut().zip(&self.bones) {
            *dst = state.skinning_matrix;
        }
    }

    #[must_use]
    pub fn local_matrix(&self, index: usize) -> Option<Mat4> {
        self.bones.get(index).map(|b| b.local_matrix)
    }

    /// Model-space position and rotation of one bone, read from its skinning
    /// matrix.
    #[must_use]
    pub fn bone_transform(&self, index: usize) -> Option<BoneTransform> {
        self.bones.get(index).map(BoneTransform::from)
    }

    pub fn bone_transforms(&self) -> impl Iterator<Item = BoneTransform> + '_ {
        self.bones.iter().map(BoneTransform::from)
    }

    #[inline]
    #[must_use]
    pub fn material_states(&self) -> &[MaterialState] {
        &self.materials
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Evaluation order of the bones posed before physics.
    #[inline]
    #[must_use]
    pub fn pre_physics_bones(&self) -> &[usize] {
        &self.pre_physics
    }

    #[inline]
    #[must_use]
    pub fn post_physics_bones(&self) -> &[usize] {
        &self.post_physics
    }

    #[must_use]
    pub fn ik_chain(&self, owner: usize) -> Option<&IkChain> {
        self.chains.get(owner)?.as_ref()
    }

    /// How the last solve of `owner`'s chain ended.
    #[must_use]
    pub fn ik_outcome(&self, owner: usize) -> Option<IkOutcome> {
        self.bones.get(owner)?.ik_outcome
    }
}

impl std::fmt::Debug for Poser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poser")
            .field("skeleton", &self.skeleton.name)
            .field("bones", &self.bones.len())
            .field("morphs", &self.morph_rates.len())
            .finish_non_exhaustive()
    }
}
