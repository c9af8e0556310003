//! Rigid-body engine interface
//!
//! The ice simulation only needs a narrow slice of a 2D physics engine:
//! bodies, convex polygon fixtures, transforms and velocities, weld joints,
//! and the list of fixture pairs that started touching during a step.
//! [`PhysicsEngine`] captures that slice; [`SandboxPhysics`] is a small
//! deterministic implementation used by the demo and the tests.

pub mod sandbox;

pub use sandbox::SandboxPhysics;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Handle to a rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub u32);

/// Handle to a collision shape attached to a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixtureHandle(pub u32);

/// Handle to a joint between two bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves; walls
    Static,
    #[default]
    Dynamic,
}

/// Parameters for a new body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            kind: BodyKind::Dynamic,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }
}

/// Body placement: body-local points map to world points by rotating by
/// `angle` and then translating by `position`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform2 {
    pub position: Vec2,
    pub angle: f32,
}

impl Transform2 {
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }

    /// Local to world
    #[inline]
    pub fn apply(&self, local: Vec2) -> Vec2 {
        self.position + Vec2::from_angle(self.angle).rotate(local)
    }

    /// World to local
    #[inline]
    pub fn inverse_apply(&self, world: Vec2) -> Vec2 {
        Vec2::from_angle(-self.angle).rotate(world - self.position)
    }

    /// Rotate a direction without translating it
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::from_angle(self.angle).rotate(v)
    }
}

/// Two fixtures that began touching during a step. Order is unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContactPair {
    pub a: FixtureHandle,
    pub b: FixtureHandle,
}

impl ContactPair {
    /// The fixture opposite `fixture`, if it is part of this pair
    pub fn other(&self, fixture: FixtureHandle) -> Option<FixtureHandle> {
        if self.a == fixture {
            Some(self.b)
        } else if self.b == fixture {
            Some(self.a)
        } else {
            None
        }
    }
}

/// What the ice simulation needs from a physics engine.
///
/// Handles passed in must be live; engines are free to panic on stale ones.
/// No method may be called while [`PhysicsEngine::step`] is running.
pub trait PhysicsEngine {
    fn create_body(&mut self, def: &BodyDef) -> BodyHandle;
    /// Also destroys the body's fixtures and joints
    fn destroy_body(&mut self, body: BodyHandle);
    fn body_exists(&self, body: BodyHandle) -> bool;

    /// Attach a convex polygon (body-local vertices, either winding)
    fn create_polygon_fixture(
        &mut self,
        body: BodyHandle,
        vertices: &[Vec2],
        density: f32,
    ) -> FixtureHandle;
    fn destroy_fixture(&mut self, fixture: FixtureHandle);
    /// Owning body of a live fixture
    fn fixture_body(&self, fixture: FixtureHandle) -> Option<BodyHandle>;
    fn fixture_count(&self, body: BodyHandle) -> usize;

    fn transform(&self, body: BodyHandle) -> Transform2;
    fn set_transform(&mut self, body: BodyHandle, transform: Transform2);
    /// Center of mass in world coordinates
    fn world_center(&self, body: BodyHandle) -> Vec2;

    fn linear_velocity(&self, body: BodyHandle) -> Vec2;
    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2);
    fn angular_velocity(&self, body: BodyHandle) -> f32;
    fn set_angular_velocity(&mut self, body: BodyHandle, omega: f32);

    /// Inactive bodies neither move nor collide
    fn set_active(&mut self, body: BodyHandle, active: bool);
    fn is_active(&self, body: BodyHandle) -> bool;

    /// Rigidly attach `a` to `b` at a world-space anchor
    fn create_weld_joint(&mut self, a: BodyHandle, b: BodyHandle, anchor: Vec2) -> JointHandle;
    fn destroy_joint(&mut self, joint: JointHandle);
    /// Joints touching `body`, each with the body on the other end
    fn joints(&self, body: BodyHandle) -> Vec<(JointHandle, BodyHandle)>;

    fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32);
    /// Begin-contact pairs accumulated since the last drain
    fn drain_contacts(&mut self) -> Vec<ContactPair>;
}
