//! Physics Seam
//!
//! Rigid-body simulation is supplied by the host. The crate only drives it:
//! between [`Poser::pre_physics_posing`] and [`Poser::post_physics_posing`]
//! the reactor reads the kinematic bones and writes the skinning matrix of
//! each simulated bone back through [`Poser::bone_mut`].
//!
//! Pre-computed frames and pose caches read bones from their skinning
//! matrices, so that write is all a reactor needs. Reactors that want
//! post-physics children to follow a body use
//! [`BoneState::set_simulated`](crate::poser::BoneState::set_simulated),
//! which also rebuilds the model-space transform.

use glam::Vec3;

use crate::poser::Poser;

/// Gravity of a rigid-body world. `direction` is kept normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    pub strength: f32,
    pub direction: Vec3,
}

impl Default for Gravity {
    fn default() -> Self {
        Self {
            strength: 9.8,
            direction: Vec3::NEG_Y,
        }
    }
}

impl Gravity {
    #[must_use]
    pub fn new(strength: f32, direction: Vec3) -> Self {
        Self {
            strength,
            direction: direction.normalize_or(Vec3::NEG_Y),
        }
    }

    #[inline]
    #[must_use]
    pub fn acceleration(&self) -> Vec3 {
        self.direction * self.strength
    }
}

/// A rigid-body world that reacts to posed skeletons.
///
/// Implementations are moved onto pre-computation worker threads, hence the
/// `Send` bound.
pub trait PhysicsReactor: Send {
    /// Registers the rigid bodies of `poser`'s model.
    fn add_poser(&mut self, poser: &Poser);

    fn remove_poser(&mut self, poser: &Poser);

    /// Snaps every body of `poser` back to the current pose, dropping
    /// velocities.
    fn reset(&mut self, poser: &mut Poser);

    /// Advances the simulation by `step` seconds in at most `max_sub_steps`
    /// fixed sub-steps of `fixed_step` seconds, then writes simulated bones
    /// back into `poser`. Time beyond the sub-step budget is dropped.
    fn react(&mut self, poser: &mut Poser, step: f32, max_sub_steps: u32, fixed_step: f32);

    fn set_gravity(&mut self, _gravity: Gravity) {}

    #[must_use]
    fn gravity(&self) -> Gravity {
        Gravity::default()
    }

    /// Toggles the static ground plane.
    fn set_floor(&mut self, _enabled: bool) {}

    #[must_use]
    fn has_floor(&self) -> bool {
        false
    }
}

/// Reactor for models posed without physics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPhysicsReactor;

impl PhysicsReactor for NullPhysicsReactor {
    fn add_poser(&mut self, _poser: &Poser) {}

    fn remove_poser(&mut self, _poser: &Poser) {}

    fn reset(&mut self, _poser: &mut Poser) {}

    fn react(&mut self, _poser: &mut Poser, _step: f32, _max_sub_steps: u32, _fixed_step: f32) {}
}

impl<R: PhysicsReactor + ?Sized> PhysicsReactor for Box<R> {
    fn add_poser(&mut self, poser: &Poser) {
        (**self).add_poser(poser);
    }

    fn remove_poser(&mut self, poser: &Poser) {
        (**self).remove_poser(poser);
    }

    fn reset(&mut self, poser: &mut Poser) {
        (**self).reset(poser);
    }

    fn react(&mut self, poser: &mut Poser, step: f32, max_sub_steps: u32, fixed_step: f32) {
        (**self).react(poser, step, max_sub_steps, fixed_step);
    }

    fn set_gravity(&mut self, gravity: Gravity) {
        (**self).set_gravity(gravity);
    }

    fn gravity(&self) -> Gravity {
        (**self).gravity()
    }

    fn set_floor(&mut self, enabled: bool) {
        (**self).set_floor(enabled);
    }

    fn has_floor(&self) -> bool {
        (**self).has_floor()
    }
}
