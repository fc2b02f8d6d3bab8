use rustc_hash::FxHashMap;

use crate::animation::values::BonePose;
use crate::poser::Poser;

/// A single named pose, as stored in a pose preset file.
#[derive(Debug, Clone, Default)]
pub struct StaticPose {
    /// Model the pose was authored for. Informational only.
    pub model_name: String,
    pub bone_poses: FxHashMap<String, BonePose>,
}

impl StaticPose {
    #[must_use]
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            bone_poses: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn with_bone(mut self, name: impl Into<String>, pose: BonePose) -> Self {
        self.bone_poses.insert(name.into(), pose);
        self
    }

    /// Writes every pose whose bone exists in the poser's skeleton. Returns
    /// the number of bones that matched.
    pub fn apply(&self, poser: &mut Poser) -> usize {
        let mut applied = 0;
        for (name, pose) in &self.bone_poses {
            if poser.set_bone_pose_by_name(name, *pose) {
                applied += 1;
            }
        }
        if applied < self.bone_poses.len() {
            log::debug!(
                "Pose for '{}': {} of {} bones matched",
                self.model_name,
                applied,
                self.bone_poses.len()
            );
        }
        applied
    }
}
