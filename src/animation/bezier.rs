use glam::Vec2;

use crate::math::MMD_EPSILON;

const PRESAMPLE_RESOLUTION: usize = 32;
const BISECTION_STEPS: usize = 32;

/// Cubic bezier ease curve through `(0,0)`, `c0`, `c1`, `(1,1)`.
///
/// Control points live in the unit square. They are kept multiplied by 3,
/// which is the coefficient they carry in the expanded bernstein form, so
/// evaluating a coordinate is `t * ((1-t) * ((1-t) * c0 + t * c1) + t²)`.
///
/// Curves whose control points sit on the diagonal are linear and skip the
/// lookup table entirely. Everything else is inverted once into a 32-entry
/// table when the control points are set; `calculate` is then a table lerp.
#[derive(Debug, Clone, PartialEq)]
pub struct BezierEasing {
    c0: Vec2,
    c1: Vec2,
    linear: bool,
    samples: [f32; PRESAMPLE_RESOLUTION],
}

impl Default for BezierEasing {
    fn default() -> Self {
        Self::linear()
    }
}

impl BezierEasing {
    /// The identity easing.
    #[must_use]
    pub fn linear() -> Self {
        Self {
            c0: Vec2::ZERO,
            c1: Vec2::splat(3.0),
            linear: true,
            samples: [0.0; PRESAMPLE_RESOLUTION],
        }
    }

    #[must_use]
    pub fn new(c0: Vec2, c1: Vec2) -> Self {
        let mut easing = Self::linear();
        easing.set_control_points(c0, c1);
        easing
    }

    /// Builds a curve from control points quantized to `0..=127`, the way
    /// keyframe assets store them.
    #[must_use]
    pub fn from_quantized(x0: u8, y0: u8, x1: u8, y1: u8) -> Self {
        const R: f32 = 1.0 / 127.0;
        Self::new(
            Vec2::new(f32::from(x0) * R, f32::from(y0) * R),
            Vec2::new(f32::from(x1) * R, f32::from(y1) * R),
        )
    }

    /// Control points in the unit square.
    #[must_use]
    pub fn control_points(&self) -> (Vec2, Vec2) {
        (self.c0 / 3.0, self.c1 / 3.0)
    }

    #[inline]
    #[must_use]
    pub fn is_linear(&self) -> bool {
        self.linear
    }

    pub fn set_control_points(&mut self, c0: Vec2, c1: Vec2) {
        self.c0 = c0 * 3.0;
        self.c1 = c1 * 3.0;
        self.presample();
    }

    /// Maps a linear parameter in `[0, 1]` onto the curve.
    #[must_use]
    pub fn calculate(&self, x: f32) -> f32 {
        if self.linear {
            return x;
        }
        let x = x.clamp(0.0, 1.0) * (PRESAMPLE_RESOLUTION - 1) as f32;
        let ix = x as usize;
        let r = x - ix as f32;
        if ix < PRESAMPLE_RESOLUTION - 1 {
            (1.0 - r) * self.samples[ix] + r * self.samples[ix + 1]
        } else {
            self.samples[PRESAMPLE_RESOLUTION - 1]
        }
    }

    fn presample(&mut self) {
        if (self.c0.x - self.c0.y).abs() < MMD_EPSILON && (self.c1.x - self.c1.y).abs() < MMD_EPSILON {
            self.linear = true;
            return;
        }
        self.linear = false;
        for i in 0..PRESAMPLE_RESOLUTION {
            let x = i as f32 / (PRESAMPLE_RESOLUTION - 1) as f32;
            self.samples[i] = self.solve(x);
        }
        // The curve is anchored at (0,0) and (1,1); bisection only gets
        // within epsilon of them.
        self.samples[0] = 0.0;
        self.samples[PRESAMPLE_RESOLUTION - 1] = 1.0;
    }

    /// Finds `t` with `X(t) == x` by bisection and returns `Y(t)`.
    fn solve(&self, x: f32) -> f32 {
        let mut l = 0.0_f32;
        let mut r = 1.0_f32;
        let mut t = 0.0_f32;
        for _ in 0..BISECTION_STEPS {
            t = (l + r) * 0.5;
            let m = bezier(t, self.c0.x, self.c1.x);
            if (m - x).abs() < MMD_EPSILON {
                break;
            }
            if m > x {
                r = t;
            } else {
                l = t;
            }
        }
        bezier(t, self.c0.y, self.c1.y)
    }
}

#[inline]
fn bezier(t: f32, c0: f32, c1: f32) -> f32 {
    let s = 1.0 - t;
    t * (s * (s * c0 + t * c1) + t * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bezier_hits_endpoints() {
        assert!((bezier(0.0, 0.9, 2.1)).abs() < 1e-7);
        assert!((bezier(1.0, 0.9, 2.1) - 1.0).abs() < 1e-7);
    }

    #[test]
    fn samples_are_monotonic_for_ease_in_out() {
        let easing = BezierEasing::new(Vec2::new(0.42, 0.0), Vec2::new(0.58, 1.0));
        assert!(!easing.is_linear());
        for pair in easing.samples.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-6, "{pair:?}");
        }
    }
}
