use crate::animation::values::Keyframed;
use crate::math::seconds_to_frame;

/// A single key: the value reached at `frame` and the easing used on the way
/// to the next key.
#[derive(Debug, Clone)]
pub struct Keyframe<T: Keyframed> {
    pub frame: u32,
    pub value: T,
    pub easing: T::Easing,
}

impl<T: Keyframed> Keyframe<T> {
    #[must_use]
    pub fn new(frame: u32, value: T, easing: T::Easing) -> Self {
        Self {
            frame,
            value,
            easing,
        }
    }

    /// A key that blends linearly into its successor.
    #[must_use]
    pub fn linear(frame: u32, value: T) -> Self {
        Self::new(frame, value, T::Easing::default())
    }
}

/// Where a sample position falls on a track.
#[derive(Debug)]
pub enum Bracket<'a, T: Keyframed> {
    /// On a key, or clamped to the first/last key.
    Exact(&'a Keyframe<T>),
    /// Strictly between two consecutive keys, `t` in `(0, 1)`.
    Between {
        left: &'a Keyframe<T>,
        right: &'a Keyframe<T>,
        t: f32,
    },
}

/// Sparse, frame-indexed keys of one animated value.
///
/// Keys are strictly ascending by frame. Tracks are built once from keys in
/// any order and never change afterwards.
#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Keyframed> {
    keys: Vec<Keyframe<T>>,
}

impl<T: Keyframed> Default for KeyframeTrack<T> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<T: Keyframed> FromIterator<Keyframe<T>> for KeyframeTrack<T> {
    fn from_iter<I: IntoIterator<Item = Keyframe<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: Keyframed> KeyframeTrack<T> {
    /// Sorts the keys by frame. When several keys share a frame the one
    /// inserted last wins.
    #[must_use]
    pub fn new(mut keys: Vec<Keyframe<T>>) -> Self {
        keys.sort_by_key(|k| k.frame);
        keys.reverse();
        keys.dedup_by_key(|k| k.frame);
        keys.reverse();
        Self { keys }
    }

    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Frame of the last key, or 0 for an empty track.
    #[must_use]
    pub fn last_frame(&self) -> u32 {
        self.keys.last().map_or(0, |k| k.frame)
    }

    /// Locates `position` (in frames) among the keys. NaN lands on the first
    /// key.
    #[must_use]
    pub fn bracket(&self, position: f32) -> Option<Bracket<'_, T>> {
        let first = self.keys.first()?;
        if position.is_nan() || first.frame as f32 >= position {
            return Some(Bracket::Exact(first));
        }
        let last = self.keys.last()?;
        if last.frame as f32 <= position {
            return Some(Bracket::Exact(last));
        }

        // First key at or after the position. The guards above make sure it
        // is neither the first nor past the end.
        let right_idx = self.keys.partition_point(|k| (k.frame as f32) < position);
        let right = &self.keys[right_idx];
        if right.frame as f32 == position {
            return Some(Bracket::Exact(right));
        }
        let left = &self.keys[right_idx - 1];
        let t = (position - left.frame as f32) / (right.frame - left.frame) as f32;
        Some(Bracket::Between { left, right, t })
    }

    /// Samples the track at a frame position. `None` if the track is empty.
    #[must_use]
    pub fn sample(&self, position: f32) -> Option<T> {
        Some(match self.bracket(position)? {
            Bracket::Exact(key) => key.value.clone(),
            Bracket::Between { left, right, t } => T::blend(&left.value, &right.value, &left.easing, t),
        })
    }

    /// Samples the track, falling back to `default` when it has no keys.
    #[must_use]
    pub fn sample_or(&self, position: f32, default: T) -> T {
        self.sample(position).unwrap_or(default)
    }

    /// Samples the track at a time in seconds.
    #[must_use]
    pub fn sample_time(&self, seconds: f64) -> Option<T> {
        self.sample(seconds_to_frame(seconds))
    }
}
