//! Spring-damper secondary motion.
//!
//! Every window gets its own [`MotionState`], created on first use with the
//! engine's global spring and damping.  Forces accumulate into the state's
//! acceleration; [`PhysicsMotion::get_next_position`] integrates them with
//! semi-implicit Euler and clears the accumulator.
//!
//! Two damping pathways exist and are kept apart:
//!
//! * the per-window force from [`add_damping_force`](PhysicsMotion::add_damping_force)
//!   (`-damping · v`, added to the acceleration), and
//! * the global decay `v *= 1 - global_damping · dt`, applied by
//!   [`update_motion`](PhysicsMotion::update_motion) to every window and by
//!   `get_next_position` to the window being integrated.

use crate::command::WindowId;
use glam::Vec2;
use std::collections::HashMap;

/// Dynamic state of one window.
///
/// `mass` is stored and settable but the integrator does not divide by it;
/// forces are applied as accelerations directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub angular_velocity: f32,
    pub angular_acceleration: f32,
    pub spring: f32,
    pub damping: f32,
    pub mass: f32,
}

impl MotionState {
    fn at_rest(spring: f32, damping: f32) -> Self {
        Self {
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            angular_velocity: 0.0,
            angular_acceleration: 0.0,
            spring,
            damping,
            mass: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsMotion {
    motions: HashMap<WindowId, MotionState>,
    global_spring: f32,
    global_damping: f32,
}

impl Default for PhysicsMotion {
    fn default() -> Self {
        Self::new(0.8, 0.92)
    }
}

impl PhysicsMotion {
    pub fn new(global_spring: f32, global_damping: f32) -> Self {
        Self {
            motions: HashMap::new(),
            global_spring,
            global_damping,
        }
    }

    fn motion_mut(&mut self, window: WindowId) -> &mut MotionState {
        let (spring, damping) = (self.global_spring, self.global_damping);
        self.motions
            .entry(window)
            .or_insert_with(|| MotionState::at_rest(spring, damping))
    }

    fn decay(motion: &mut MotionState, global_damping: f32, dt: f32) {
        let factor = 1.0 - global_damping * dt;
        motion.velocity *= factor;
        motion.angular_velocity *= factor;
    }

    //  Forces

    /// Pull `window` toward `target` with its own spring constant.
    pub fn add_spring_force(&mut self, window: WindowId, target: Vec2, current: Vec2) {
        let motion = self.motion_mut(window);
        motion.acceleration += (target - current) * motion.spring;
    }

    pub fn add_damping_force(&mut self, window: WindowId) {
        let motion = self.motion_mut(window);
        motion.acceleration += motion.velocity * -motion.damping;
    }

    /// Adds `center × strength`.
    ///
    /// The window's position is not consulted, so this is a constant push
    /// rather than an attraction toward `center`.
    pub fn add_gravity_force(&mut self, window: WindowId, center: Vec2, strength: f32) {
        self.motion_mut(window).acceleration += center * strength;
    }

    /// Adds a constant `(0.1·strength, 0.1·strength)` for every entry of
    /// `others` that is not `window` itself.
    pub fn add_repulsion_force(&mut self, window: WindowId, others: &[WindowId], strength: f32) {
        let push = Vec2::splat(strength * 0.1);
        let count = others.iter().filter(|&&other| other != window).count();
        let motion = self.motion_mut(window);
        for _ in 0..count {
            motion.acceleration += push;
        }
    }

    /// Feed the rotational integrator (degrees per second squared).
    pub fn add_torque(&mut self, window: WindowId, angular_acceleration: f32) {
        self.motion_mut(window).angular_acceleration += angular_acceleration;
    }

    //  Integration

    /// Advance one step and return the new position.
    ///
    /// Global decay first, then `v += a·dt`, `p = current + v·dt`, and the
    /// accumulated acceleration is cleared.
    pub fn get_next_position(&mut self, window: WindowId, current: Vec2, dt: f32) -> Vec2 {
        let global_damping = self.global_damping;
        let motion = self.motion_mut(window);
        Self::decay(motion, global_damping, dt);
        motion.velocity += motion.acceleration * dt;
        motion.acceleration = Vec2::ZERO;
        current + motion.velocity * dt
    }

    /// Advance the rotational state one step and return the new rotation.
    ///
    /// Angular velocity is multiplied by the window's damping every step,
    /// independently of `dt`.
    pub fn get_next_rotation(&mut self, window: WindowId, current: f32, dt: f32) -> f32 {
        let motion = self.motion_mut(window);
        motion.angular_velocity += motion.angular_acceleration * dt;
        motion.angular_velocity *= motion.damping;
        motion.angular_acceleration = 0.0;
        current + motion.angular_velocity * dt
    }

    /// Apply the global decay to every tracked window.
    pub fn update_motion(&mut self, dt: f32) {
        let global_damping = self.global_damping;
        for motion in self.motions.values_mut() {
            Self::decay(motion, global_damping, dt);
        }
    }

    //  State

    /// Zero for windows that have no state; does not create one.
    pub fn get_velocity(&self, window: WindowId) -> Vec2 {
        self.motions
            .get(&window)
            .map_or(Vec2::ZERO, |motion| motion.velocity)
    }

    pub fn motion_state(&self, window: WindowId) -> Option<&MotionState> {
        self.motions.get(&window)
    }

    /// Zero all linear and angular motion; spring, damping and mass stay.
    pub fn reset_motion(&mut self, window: WindowId) {
        let motion = self.motion_mut(window);
        motion.velocity = Vec2::ZERO;
        motion.acceleration = Vec2::ZERO;
        motion.angular_velocity = 0.0;
        motion.angular_acceleration = 0.0;
    }

    pub fn set_motion_properties(&mut self, window: WindowId, spring: f32, damping: f32, mass: f32) {
        let motion = self.motion_mut(window);
        motion.spring = spring;
        motion.damping = damping;
        motion.mass = mass;
    }

    pub fn remove_window(&mut self, window: WindowId) {
        if self.motions.remove(&window).is_some() {
            log::debug!("dropped motion state for {}", window);
        }
    }

    pub fn clear(&mut self) {
        self.motions.clear();
    }

    /// Only affects windows whose state is created afterwards.
    pub fn set_global_spring(&mut self, spring: f32) {
        self.global_spring = spring;
    }

    /// Affects the global decay immediately, and the per-window damping of
    /// states created afterwards.
    pub fn set_global_damping(&mut self, damping: f32) {
        self.global_damping = damping;
    }

    pub fn global_spring(&self) -> f32 {
        self.global_spring
    }

    pub fn global_damping(&self) -> f32 {
        self.global_damping
    }

    pub fn tracked_windows(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.motions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.motions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }
}
