use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::animation::bezier::BezierEasing;
use crate::animation::tracks::{Keyframe, KeyframeTrack};
use crate::animation::values::{BoneEasing, BonePose, Keyframed, MorphPose};
use crate::math::FRAMES_PER_SECOND;

/// Tracks addressed by name, stored densely so players can bind them by slot.
#[derive(Debug, Clone)]
pub struct NamedTracks<T: Keyframed> {
    names: Vec<String>,
    tracks: Vec<KeyframeTrack<T>>,
    lookup: FxHashMap<String, usize>,
}

impl<T: Keyframed> Default for NamedTracks<T> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            tracks: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }
}

impl<T: Keyframed> NamedTracks<T> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KeyframeTrack<T>> {
        self.slot(name).map(|slot| &self.tracks[slot])
    }

    #[must_use]
    pub fn by_slot(&self, slot: usize) -> Option<&KeyframeTrack<T>> {
        self.tracks.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyframeTrack<T>)> {
        self.names.iter().map(String::as_str).zip(&self.tracks)
    }

    fn insert(&mut self, name: String, track: KeyframeTrack<T>) {
        self.lookup.insert(name.clone(), self.tracks.len());
        self.names.push(name);
        self.tracks.push(track);
    }
}

/// A keyframe motion: one bone track per animated bone name and one morph
/// track per animated morph name.
#[derive(Debug, Clone, Default)]
pub struct Motion {
    pub name: String,
    /// Last keyed frame across every track.
    pub length: u32,
    pub bone_tracks: NamedTracks<BonePose>,
    pub morph_tracks: NamedTracks<MorphPose>,
}

impl Motion {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> MotionBuilder {
        MotionBuilder::new(name)
    }

    /// Samples the bone track `name` at a frame position. Unknown bones stay
    /// at rest.
    #[must_use]
    pub fn bone_pose(&self, name: &str, frame: f32) -> BonePose {
        self.bone_tracks
            .get(name)
            .map_or(BonePose::IDENTITY, |t| t.sample_or(frame, BonePose::IDENTITY))
    }

    #[must_use]
    pub fn morph_pose(&self, name: &str, frame: f32) -> MorphPose {
        self.morph_tracks
            .get(name)
            .map_or(MorphPose::default(), |t| t.sample_or(frame, MorphPose::default()))
    }

    #[must_use]
    pub fn length_seconds(&self) -> f64 {
        f64::from(self.length) / FRAMES_PER_SECOND
    }
}

/// Collects keys in any order, the way a motion file reader emits them, and
/// freezes them into a [`Motion`].
#[derive(Debug, Default)]
pub struct MotionBuilder {
    name: String,
    bones: Vec<(String, Vec<Keyframe<BonePose>>)>,
    morphs: Vec<(String, Vec<Keyframe<MorphPose>>)>,
    bone_slots: FxHashMap<String, usize>,
    morph_slots: FxHashMap<String, usize>,
}

impl MotionBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a bone key. `interpolation` holds the `[x0, y0, x1, y1]` control
    /// quads for x, y, z and rotation.
    pub fn add_bone_key(
        &mut self,
        name: &str,
        frame: u32,
        translation: Vec3,
        rotation: Quat,
        interpolation: [[u8; 4]; 4],
    ) -> &mut Self {
        let key = Keyframe::new(
            frame,
            BonePose::new(translation, rotation),
            BoneEasing::from_quantized(interpolation),
        );
        let slot = *self.bone_slots.entry(name.to_owned()).or_insert_with(|| {
            self.bones.push((name.to_owned(), Vec::new()));
            self.bones.len() - 1
        });
        self.bones[slot].1.push(key);
        self
    }

    /// Adds a bone key that eases linearly into the next one.
    pub fn add_linear_bone_key(&mut self, name: &str, frame: u32, translation: Vec3, rotation: Quat) -> &mut Self {
        self.add_bone_key(name, frame, translation, rotation, [[20, 20, 107, 107]; 4])
    }

    pub fn add_morph_key(&mut self, name: &str, frame: u32, weight: f32) -> &mut Self {
        let key = Keyframe::new(frame, MorphPose::new(weight), BezierEasing::linear());
        let slot = *self.morph_slots.entry(name.to_owned()).or_insert_with(|| {
            self.morphs.push((name.to_owned(), Vec::new()));
            self.morphs.len() - 1
        });
        self.morphs[slot].1.push(key);
        self
    }

    #[must_use]
    pub fn build(self) -> Motion {
        let mut motion = Motion {
            name: self.name,
            ..Motion::default()
        };
        for (name, keys) in self.bones {
            let track = KeyframeTrack::new(keys);
            motion.length = motion.length.max(track.last_frame());
            motion.bone_tracks.insert(name, track);
        }
        for (name, keys) in self.morphs {
            let track = KeyframeTrack::new(keys);
            motion.length = motion.length.max(track.last_frame());
            motion.morph_tracks.insert(name, track);
        }
        log::debug!(
            "Motion '{}': {} bone tracks, {} morph tracks, {} frames",
            motion.name,
            motion.bone_tracks.len(),
            motion.morph_tracks.len(),
            motion.length
        );
        motion
    }
}
