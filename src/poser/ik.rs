//! Cyclic Coordinate Descent IK
//!
//! Each IK owner drags a target bone towards its own position by rotating a
//! chain of link bones one at a time, nearest link first. Links may carry
//! per-axis Euler limits. Those are classified once at construction into an
//! Euler decomposition order that keeps the constrained axis away from gimbal
//! lock, and an axis-fix that tells the solver when the link is a hinge.

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use smallvec::SmallVec;

use crate::math::{MMD_EPSILON, translation_of};
use crate::poser::pipeline::{update_local_matrix, update_self_transform};
use crate::poser::state::BoneState;
use crate::skeleton::{IkDescriptor, IkLimit};

/// Hard cap on CCD rounds per solve.
pub const MAX_IK_ITERATIONS: u32 = 256;

/// Which axes a limited link may rotate around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisFix {
    /// Free on every axis.
    None,
    /// Hinge around X.
    X,
    Y,
    Z,
    /// Locked. The solver skips the link.
    All,
}

/// Intrinsic Euler order used to clamp a limited link. The middle axis is
/// the one that must stay inside ±90°.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulerOrder {
    Zxy,
    Xyz,
    Yzx,
}

impl EulerOrder {
    /// Decomposes `q` into per-axis angles stored as `(x, y, z)`.
    #[must_use]
    pub fn decompose(self, q: Quat) -> Vec3 {
        match self {
            EulerOrder::Zxy => {
                let (z, x, y) = q.to_euler(EulerRot::ZXY);
                Vec3::new(x, y, z)
            }
            EulerOrder::Xyz => {
                let (x, y, z) = q.to_euler(EulerRot::XYZ);
                Vec3::new(x, y, z)
            }
            EulerOrder::Yzx => {
                let (y, z, x) = q.to_euler(EulerRot::YZX);
                Vec3::new(x, y, z)
            }
        }
    }

    /// Inverse of [`decompose`](Self::decompose).
    #[must_use]
    pub fn compose(self, angles: Vec3) -> Quat {
        match self {
            EulerOrder::Zxy => Quat::from_euler(EulerRot::ZXY, angles.z, angles.x, angles.y),
            EulerOrder::Xyz => Quat::from_euler(EulerRot::XYZ, angles.x, angles.y, angles.z),
            EulerOrder::Yzx => Quat::from_euler(EulerRot::YZX, angles.y, angles.z, angles.x),
        }
    }
}

/// Normalized joint limits of one link, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimits {
    pub min: Vec3,
    pub max: Vec3,
    pub order: EulerOrder,
    pub fix: AxisFix,
}

impl JointLimits {
    #[must_use]
    pub fn new(limit: &IkLimit) -> Self {
        let min = limit.lower.min(limit.upper);
        let max = limit.lower.max(limit.upper);

        let inside_half_pi = |lo: f32, hi: f32| lo > -FRAC_PI_2 && hi < FRAC_PI_2;
        let order = if inside_half_pi(min.x, max.x) {
            EulerOrder::Zxy
        } else if inside_half_pi(min.y, max.y) {
            EulerOrder::Xyz
        } else {
            EulerOrder::Yzx
        };

        let collapsed = |axis: usize| min[axis].abs() < MMD_EPSILON && max[axis].abs() < MMD_EPSILON;
        let fix = match (collapsed(0), collapsed(1), collapsed(2)) {
            (true, true, true) => AxisFix::All,
            (_, true, true) => AxisFix::X,
            (true, _, true) => AxisFix::Y,
            (true, true, _) => AxisFix::Z,
            _ => AxisFix::None,
        };

        Self { min, max, order, fix }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkLinkState {
    pub bone: usize,
    pub limits: Option<JointLimits>,
}

impl IkLinkState {
    #[must_use]
    pub fn fix(&self) -> AxisFix {
        self.limits.map_or(AxisFix::None, |l| l.fix)
    }
}

/// Validated IK descriptor of one owner bone.
#[derive(Debug, Clone, PartialEq)]
pub struct IkChain {
    pub target: usize,
    pub links: SmallVec<[IkLinkState; 4]>,
    pub iterations: u32,
    pub angle_limit: f32,
}

impl IkChain {
    /// Resolves a descriptor against a skeleton of `bone_count` bones.
    /// Returns `None` when the target does not exist; out of range links are
    /// dropped.
    pub(crate) fn new(descriptor: &IkDescriptor, bone_count: usize) -> Option<Self> {
        if descriptor.target >= bone_count {
            return None;
        }
        let links = descriptor
            .links
            .iter()
            .filter(|link| link.bone < bone_count)
            .map(|link| IkLinkState {
                bone: link.bone,
                limits: link.limit.as_ref().map(JointLimits::new),
            })
            .collect();
        Some(Self {
            target: descriptor.target,
            links,
            iterations: descriptor.iterations.min(MAX_IK_ITERATIONS),
            angle_limit: descriptor.angle_limit,
        })
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkOutcome {
    /// Complete CCD rounds run.
    pub iterations: u32,
    pub converged: bool,
    /// Squared distance between the owner and the target when the solve
    /// stopped.
    pub error: f32,
}

/// Clamps Euler angles into `[min, max]`.
///
/// An angle past a bound is first mirrored back across it; the mirror is
/// kept only while `reflect` is set and it lands inside the opposite bound.
/// Otherwise the angle sticks to the bound.
#[must_use]
pub fn limit_euler(euler: Vec3, min: Vec3, max: Vec3, reflect: bool) -> Vec3 {
    let mut out = euler;
    for i in 0..3 {
        if out[i] < min[i] {
            let mirrored = 2.0 * min[i] - out[i];
            out[i] = if reflect && mirrored <= max[i] { mirrored } else { min[i] };
        }
        if out[i] > max[i] {
            let mirrored = 2.0 * max[i] - out[i];
            out[i] = if reflect && mirrored >= min[i] { mirrored } else { max[i] };
        }
    }
    out
}

#[inline]
fn sign(x: f32) -> f32 {
    if x > 0.0 { 1.0 } else { -1.0 }
}

/// Runs CCD for the chain owned by `owner`.
///
/// Rewrites the IK delta and local matrix of every link and the local matrix
/// of the target. Bounded by the chain's iteration cap; never fails.
pub(crate) fn solve(bones: &mut [BoneState], chains: &[Option<IkChain>], owner: usize) -> Option<IkOutcome> {
    let chain = chains.get(owner)?.as_ref()?;

    for link in &chain.links {
        bones[link.bone].ik_rotation = Quat::IDENTITY;
    }
    let ik_position = translation_of(&bones[owner].local_matrix);
    update_self_transform(bones, chains, chain.target);
    let mut target_position = translation_of(&bones[chain.target].local_matrix);

    let error = ik_position.distance_squared(target_position);
    if error < MMD_EPSILON {
        return Some(IkOutcome {
            iterations: 0,
            converged: true,
            error,
        });
    }

    let half = chain.iterations / 2;
    let mut outcome = IkOutcome {
        iterations: 0,
        converged: false,
        error,
    };

    for round in 0..chain.iterations {
        let first_half = round < half;

        for (j, link) in chain.links.iter().enumerate() {
            if link.fix() == AxisFix::All {
                continue;
            }
            let link_position = translation_of(&bones[link.bone].local_matrix);
            let target_dir = (link_position - target_position).normalize_or_zero();
            let ik_dir = (link_position - ik_position).normalize_or_zero();

            let mut axis = target_dir.cross(ik_dir);
            for k in 0..3 {
                if axis[k].abs() < MMD_EPSILON {
                    axis[k] = MMD_EPSILON;
                }
            }

            let parent_matrix = bones[link.bone]
                .parent
                .map_or(Mat4::IDENTITY, |p| bones[p].local_matrix);

            let hinge = match link.limits {
                Some(limits) if first_half => match limits.fix {
                    AxisFix::X => Some(0),
                    AxisFix::Y => Some(1),
                    AxisFix::Z => Some(2),
                    AxisFix::None | AxisFix::All => None,
                },
                _ => None,
            };
            axis = match hinge {
                Some(k) => {
                    let mut hinge_axis = Vec3::ZERO;
                    hinge_axis[k] = sign(axis.dot(parent_matrix.col(k).truncate()));
                    hinge_axis
                }
                None => (Mat3::from_mat4(parent_matrix).transpose() * axis).normalize_or_zero(),
            };

            let angle = target_dir
                .dot(ik_dir)
                .clamp(-1.0, 1.0)
                .acos()
                .min(chain.angle_limit * (j + 1) as f32);

            let state = &mut bones[link.bone];
            if axis != Vec3::ZERO {
                state.ik_rotation = Quat::from_axis_angle(axis, angle) * state.ik_rotation;
            }

            if let Some(limits) = link.limits {
                let local = state.ik_rotation * state.pre_ik_rotation;
                let euler = limit_euler(limits.order.decompose(local), limits.min, limits.max, first_half);
                let limited = limits.order.compose(euler);
                state.ik_rotation = limited * state.pre_ik_rotation.inverse();
            }

            for k in (0..=j).rev() {
                let bone = chain.links[k].bone;
                let state = &mut bones[bone];
                state.total_rotation = state.ik_rotation * state.pre_ik_rotation;
                update_local_matrix(bones, bone);
            }

            update_self_transform(bones, chains, chain.target);
            target_position = translation_of(&bones[chain.target].local_matrix);
        }

        outcome.iterations = round + 1;
        outcome.error = ik_position.distance_squared(target_position);
        if outcome.error < MMD_EPSILON {
            outcome.converged = true;
            break;
        }
    }

    log::trace!(
        "IK owner #{owner}: {} rounds, converged={}, error={}",
        outcome.iterations,
        outcome.converged,
        outcome.error
    );
    Some(outcome)
}
