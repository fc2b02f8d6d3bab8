use std::sync::Arc;

use glam::Vec3;

use crate::animation::motion::Motion;
use crate::animation::values::{BonePose, MorphPose};
use crate::math::seconds_to_frame;
use crate::poser::Poser;
use crate::skeleton::Skeleton;

/// Binding of one motion track to a skeleton slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrackBinding {
    track: usize,
    target: usize,
}

/// Plays a [`Motion`] onto a skeleton.
///
/// Track names are resolved against the skeleton once, at construction, and
/// the player keeps that skeleton. Tracks without a matching bone or morph
/// are ignored.
#[derive(Debug, Clone)]
pub struct MotionPlayer {
    motion: Arc<Motion>,
    skeleton: Arc<Skeleton>,
    bones: Vec<TrackBinding>,
    morphs: Vec<TrackBinding>,
}

impl MotionPlayer {
    #[must_use]
    pub fn new(motion: Arc<Motion>, skeleton: &Arc<Skeleton>) -> Self {
        let bones: Vec<TrackBinding> = skeleton
            .bones
            .iter()
            .enumerate()
            .filter_map(|(target, bone)| {
                let track = motion.bone_tracks.slot(&bone.name)?;
                Some(TrackBinding { track, target })
            })
            .collect();
        let morphs: Vec<TrackBinding> = skeleton
            .morphs
            .iter()
            .enumerate()
            .filter_map(|(target, morph)| {
                let track = motion.morph_tracks.slot(&morph.name)?;
                Some(TrackBinding { track, target })
            })
            .collect();

        let unbound = motion.bone_tracks.len().saturating_sub(bones.len());
        if unbound > 0 {
            log::debug!(
                "Motion '{}': {unbound} bone tracks have no bone in '{}'",
                motion.name,
                skeleton.name
            );
        }
        let unbound = motion.morph_tracks.len().saturating_sub(morphs.len());
        if unbound > 0 {
            log::debug!(
                "Motion '{}': {unbound} morph tracks have no morph in '{}'",
                motion.name,
                skeleton.name
            );
        }

        Self {
            motion,
            skeleton: Arc::clone(skeleton),
            bones,
            morphs,
        }
    }

    #[inline]
    #[must_use]
    pub fn motion(&self) -> &Arc<Motion> {
        &self.motion
    }

    /// Skeleton the tracks were bound against.
    #[inline]
    #[must_use]
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    #[must_use]
    pub fn bound_bone_tracks(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn bound_morph_tracks(&self) -> usize {
        self.morphs.len()
    }

    /// Writes every bound track, sampled at a frame position, into `poser`.
    pub fn seek_frame(&self, poser: &mut Poser, frame: f32) {
        for binding in &self.morphs {
            if let Some(track) = self.motion.morph_tracks.by_slot(binding.track) {
                poser.set_morph_pose(binding.target, track.sample_or(frame, MorphPose::default()));
            }
        }
        for binding in &self.bones {
            if let Some(track) = self.motion.bone_tracks.by_slot(binding.track) {
                poser.set_bone_pose(binding.target, track.sample_or(frame, BonePose::IDENTITY));
            }
        }
    }

    pub fn seek_time(&self, poser: &mut Poser, seconds: f64) {
        self.seek_frame(poser, seconds_to_frame(seconds));
    }

    /// Computes the summed vertex-morph offsets of the bound skeleton at
    /// `seconds` into `output`, overwriting its previous contents.
    ///
    /// # Panics
    /// If `output` does not hold exactly one offset per model vertex.
    pub fn calculate_morph_vertex_offset(&self, seconds: f64, output: &mut [Vec3]) {
        let skeleton = &*self.skeleton;
        assert_eq!(
            output.len(),
            skeleton.vertex_count,
            "model vertex count does not match the output length"
        );
        output.fill(Vec3::ZERO);
        let frame = seconds_to_frame(seconds);
        for binding in &self.morphs {
            if let Some(track) = self.motion.morph_tracks.by_slot(binding.track) {
                let weight = track.sample_or(frame, MorphPose::default()).weight;
                skeleton.accumulate_vertex_morph(binding.target, weight, output);
            }
        }
    }

    /// Length of the motion in frames.
    #[must_use]
    pub fn length_frames(&self) -> u32 {
        self.motion.length
    }

    #[must_use]
    pub fn length_seconds(&self) -> f64 {
        self.motion.length_seconds()
    }
}
