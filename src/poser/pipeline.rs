//! Per-bucket transform passes.
//!
//! Each pass runs over the whole bucket before the next starts:
//! 1. self transform (keyframe + morph, IK links, IK solves)
//! 2. append transform
//! 3. local matrix refresh, so children of append bones see the final parent
//! 4. skinning matrices
//!
//! Passes are free functions over the bone slice so the IK solver can
//! re-enter the self transform of its target while holding the chain table.

use glam::Quat;

use crate::math::rigid;
use crate::poser::ik::{IkChain, solve};
use crate::poser::state::BoneState;

/// Rebuilds the model-space matrix of bone `index` from its totals and the
/// parent's current matrix.
pub(crate) fn update_local_matrix(bones: &mut [BoneState], index: usize) {
    let state = &bones[index];
    let local = rigid(state.total_rotation, state.total_translation + state.local_offset);
    let matrix = match state.parent {
        Some(parent) => bones[parent].local_matrix * local,
        None => local,
    };
    bones[index].local_matrix = matrix;
}

pub(crate) fn update_self_transform(bones: &mut [BoneState], chains: &[Option<IkChain>], index: usize) {
    let state = &mut bones[index];
    state.total_rotation = state.morph_rotation * state.key_rotation;
    state.total_translation = state.morph_translation + state.key_translation;
    if state.ik_link {
        state.pre_ik_rotation = state.total_rotation;
        state.total_rotation = state.ik_rotation * state.total_rotation;
    }
    update_local_matrix(bones, index);

    if chains[index].is_some() {
        let outcome = solve(bones, chains, index);
        bones[index].ik_outcome = outcome;
    }
}

pub(crate) fn update_append_transform(bones: &mut [BoneState], index: usize) {
    let Some(append) = bones[index].append else {
        return;
    };
    let source_rotation = bones[append.parent].total_rotation;
    let source_translation = bones[append.parent].total_translation;

    let state = &mut bones[index];
    if append.rotate {
        state.total_rotation *= Quat::IDENTITY.slerp(source_rotation, append.ratio);
    }
    if append.translate {
        state.total_translation += append.ratio * source_translation;
    }
    update_local_matrix(bones, index);
}

/// Runs the transform passes over one ordered bucket.
pub(crate) fn update_bucket(bones: &mut [BoneState], chains: &[Option<IkChain>], order: &[usize]) {
    for &index in order {
        update_self_transform(bones, chains, index);
    }
    for &index in order {
        update_append_transform(bones, index);
    }
    for &index in order {
        update_local_matrix(bones, index);
    }
    for &index in order {
        let state = &mut bones[index];
        state.skinning_matrix = state.local_matrix * state.bind_inverse;
    }
}
