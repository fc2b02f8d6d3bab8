use glam::Quat;

use crate::math::MMD_EPSILON;
use crate::poser::state::{BoneState, MaterialState};
use crate::skeleton::{MAX_GROUP_DEPTH, MaterialMorphOp, MorphKind, Skeleton};

/// Applies morph `index` at `rate` to the bone and material images.
///
/// Vertex and UV morphs act on mesh data and are left to the caller.
pub(crate) fn apply_morph(
    skeleton: &Skeleton,
    bones: &mut [BoneState],
    materials: &mut [MaterialState],
    index: usize,
    rate: f32,
) {
    apply_at(skeleton, bones, materials, index, rate, 0);
}

fn apply_at(
    skeleton: &Skeleton,
    bones: &mut [BoneState],
    materials: &mut [MaterialState],
    index: usize,
    rate: f32,
    depth: u32,
) {
    if rate < MMD_EPSILON {
        return;
    }
    if depth > MAX_GROUP_DEPTH {
        log::warn!("Group morph nesting deeper than {MAX_GROUP_DEPTH} at morph #{index}, ignored");
        return;
    }
    let Some(morph) = skeleton.morphs.get(index) else {
        return;
    };

    match &morph.kind {
        MorphKind::Group(entries) => {
            for entry in entries {
                apply_at(skeleton, bones, materials, entry.morph, entry.rate * rate, depth + 1);
            }
        }
        MorphKind::Bone(entries) => {
            for entry in entries {
                let Some(state) = bones.get_mut(entry.bone) else {
                    continue;
                };
                state.morph_translation += entry.translation * rate;
                state.morph_rotation *= Quat::IDENTITY.slerp(entry.rotation, rate);
            }
        }
        MorphKind::Material(entries) => {
            for entry in entries {
                let targets = match entry.material {
                    Some(m) if m < materials.len() => m..m + 1,
                    Some(_) => continue,
                    None => 0..materials.len(),
                };
                for material in &mut materials[targets] {
                    match entry.op {
                        MaterialMorphOp::Multiply => material.mul.accumulate(&entry.values, -1.0, rate),
                        MaterialMorphOp::Add => material.add.accumulate(&entry.values, 0.0, rate),
                    }
                }
            }
        }
        MorphKind::Vertex(_) | MorphKind::Uv(_) => {}
    }
}
