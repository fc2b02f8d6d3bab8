//! Static Skeleton Description
//!
//! The skeleton is loaded once and shared read-only between every poser that
//! animates it. Bones and morphs form an arena: parents, append parents, IK
//! targets and links, and group-morph members are all plain indices into it.

mod bone;
mod morph;

pub use bone::{AppendBone, Bone, IkDescriptor, IkLimit, IkLink};
pub use morph::{
    BoneMorphEntry, GroupMorphEntry, MaterialMorphEntry, MaterialMorphOp, MaterialValues, Morph, MorphKind,
    UvMorphEntry, VertexMorphEntry,
};

use glam::Vec3;
use xxhash_rust::xxh3::xxh3_128;

use crate::math::MMD_EPSILON;

/// Group morphs nested deeper than this are ignored. Well-formed models
/// never nest groups at all; the cap only guards against cycles.
pub(crate) const MAX_GROUP_DEPTH: u32 = 8;

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    /// Number of mesh vertices, the expected length of vertex-morph output.
    pub vertex_count: usize,
    /// Number of materials, the length of the material morph images.
    pub material_count: usize,
}

impl Skeleton {
    /// Assembles a skeleton, logging inconsistent cross references. Invalid
    /// references are tolerated here and ignored by the poser.
    #[must_use]
    pub fn new(name: impl Into<String>, bones: Vec<Bone>, morphs: Vec<Morph>) -> Self {
        let skeleton = Self {
            name: name.into(),
            bones,
            morphs,
            vertex_count: 0,
            material_count: 0,
        };
        skeleton.check_references();
        skeleton
    }

    #[must_use]
    pub fn with_vertex_count(mut self, vertex_count: usize) -> Self {
        self.vertex_count = vertex_count;
        self
    }

    #[must_use]
    pub fn with_material_count(mut self, material_count: usize) -> Self {
        self.material_count = material_count;
        self
    }

    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    #[must_use]
    pub fn morph_index(&self, name: &str) -> Option<usize> {
        self.morphs.iter().position(|m| m.name == name)
    }

    fn check_references(&self) {
        let count = self.bones.len();
        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= count {
                    log::warn!("Bone '{}' (#{i}) has out of range parent {parent}", bone.name);
                } else if self.bones[parent].transform_level > bone.transform_level {
                    log::warn!(
                        "Bone '{}' (#{i}) has a lower transform level than its parent '{}'",
                        bone.name,
                        self.bones[parent].name
                    );
                }
            }
            if let Some(append) = &bone.append
                && append.parent >= count
            {
                log::warn!("Bone '{}' (#{i}) appends out of range bone {}", bone.name, append.parent);
            }
            if let Some(ik) = &bone.ik {
                if ik.target >= count {
                    log::warn!("IK bone '{}' (#{i}) targets out of range bone {}", bone.name, ik.target);
                }
                for link in ik.links.iter().filter(|l| l.bone >= count) {
                    log::warn!("IK bone '{}' (#{i}) links out of range bone {}", bone.name, link.bone);
                }
            }
        }
    }

    // ========================================================================
    // Vertex morphs
    // ========================================================================

    /// Adds the vertex offsets of morph `index` at `rate` into `output`.
    ///
    /// Group morphs recurse into their members at `member_rate * rate`.
    /// Non-vertex morphs contribute nothing. Rates below epsilon are skipped.
    ///
    /// # Panics
    /// If `output` is not exactly `vertex_count` long.
    pub fn accumulate_vertex_morph(&self, index: usize, rate: f32, output: &mut [Vec3]) {
        assert_eq!(
            output.len(),
            self.vertex_count,
            "vertex morph output length does not match the model vertex count"
        );
        self.accumulate_vertex_morph_at(index, rate, output, 0);
    }

    fn accumulate_vertex_morph_at(&self, index: usize, rate: f32, output: &mut [Vec3], depth: u32) {
        if rate < MMD_EPSILON || depth > MAX_GROUP_DEPTH {
            return;
        }
        let Some(morph) = self.morphs.get(index) else {
            return;
        };
        match &morph.kind {
            MorphKind::Group(entries) => {
                for entry in entries {
                    self.accumulate_vertex_morph_at(entry.morph, entry.rate * rate, output, depth + 1);
                }
            }
            MorphKind::Vertex(entries) => {
                for entry in entries {
                    if let Some(v) = output.get_mut(entry.vertex) {
                        *v += entry.offset * rate;
                    }
                }
            }
            MorphKind::Bone(_) | MorphKind::Uv(_) | MorphKind::Material(_) => {}
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// 16-byte fingerprint of everything a pre-computed pose depends on:
    /// model name, vertex/material/morph counts and the ordered bone names.
    #[must_use]
    pub fn content_hash(&self) -> [u8; 16] {
        let mut bytes = Vec::with_capacity(64 + self.bones.len() * 16);
        bytes.extend_from_slice(self.name.as_bytes());
        bytes.push(0);
        for count in [self.vertex_count, self.material_count, self.morphs.len()] {
            bytes.extend_from_slice(count.to_string().as_bytes());
            bytes.push(0);
        }
        for bone in &self.bones {
            bytes.extend_from_slice(bone.name.as_bytes());
            bytes.push(0);
        }
        xxh3_128(&bytes).to_le_bytes()
    }
}
