//! Deterministic in-memory physics engine
//!
//! Enough dynamics to drive the ice simulation without a full solver:
//! - Semi-implicit integration about the center of mass
//! - Linear and angular damping (`v *= 1 / (1 + dt * damping)`)
//! - Weld joints that snap the first body onto the second
//! - Begin-contact detection between convex polygons (separating axis test)
//!
//! There is no collision response; overlapping bodies pass through each
//! other. Iteration is by handle order so runs are reproducible.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use super::{
    BodyDef, BodyHandle, BodyKind, ContactPair, FixtureHandle, JointHandle, PhysicsEngine,
    Transform2,
};

#[derive(Debug, Clone)]
struct BodyState {
    kind: BodyKind,
    transform: Transform2,
    linear_velocity: Vec2,
    angular_velocity: f32,
    linear_damping: f32,
    angular_damping: f32,
    active: bool,
    mass: f32,
    /// Center of mass in body-local coordinates
    local_center: Vec2,
}

impl BodyState {
    fn world_center(&self) -> Vec2 {
        self.transform.apply(self.local_center)
    }
}

#[derive(Debug, Clone)]
struct FixtureState {
    body: BodyHandle,
    vertices: Vec<Vec2>,
    density: f32,
}

#[derive(Debug, Clone, Copy)]
struct WeldState {
    a: BodyHandle,
    b: BodyHandle,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    /// `angle_b - angle_a` at creation
    reference_angle: f32,
}

/// In-memory [`PhysicsEngine`]
#[derive(Debug, Clone, Default)]
pub struct SandboxPhysics {
    bodies: BTreeMap<BodyHandle, BodyState>,
    fixtures: BTreeMap<FixtureHandle, FixtureState>,
    joints: BTreeMap<JointHandle, WeldState>,
    next_id: u32,
    /// Fixture pairs overlapping at the end of the last step, smaller first
    touching: BTreeSet<(FixtureHandle, FixtureHandle)>,
    contacts: Vec<ContactPair>,
}

impl SandboxPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn body(&self, body: BodyHandle) -> &BodyState {
        match self.bodies.get(&body) {
            Some(state) => state,
            None => panic!("unknown body {body:?}"),
        }
    }

    fn body_mut(&mut self, body: BodyHandle) -> &mut BodyState {
        match self.bodies.get_mut(&body) {
            Some(state) => state,
            None => panic!("unknown body {body:?}"),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.bodies.keys().copied()
    }

    /// Fixtures attached to `body`, in creation order
    pub fn fixtures_of(&self, body: BodyHandle) -> Vec<FixtureHandle> {
        self.fixtures
            .iter()
            .filter(|(_, f)| f.body == body)
            .map(|(&h, _)| h)
            .collect()
    }

    pub fn mass(&self, body: BodyHandle) -> f32 {
        self.body(body).mass
    }

    /// Recompute mass and center from the body's fixtures. The body origin
    /// stays put.
    fn update_mass(&mut self, body: BodyHandle) {
        let mut mass = 0.0;
        let mut moment = Vec2::ZERO;
        for f in self.fixtures.values().filter(|f| f.body == body) {
            let (area, centroid) = polygon_area_centroid(&f.vertices);
            let m = area * f.density;
            mass += m;
            moment += m * centroid;
        }
        let state = self.body_mut(body);
        state.mass = mass;
        state.local_center = if mass > 0.0 { moment / mass } else { Vec2::ZERO };
    }

    fn forget_contacts_of_body(&mut self, body: BodyHandle) {
        let fixtures = &self.fixtures;
        self.touching.retain(|(a, b)| {
            fixtures.get(a).is_some_and(|f| f.body != body)
                && fixtures.get(b).is_some_and(|f| f.body != body)
        });
    }

    fn integrate(&mut self, dt: f32) {
        let welded: BTreeSet<BodyHandle> = self.joints.values().map(|j| j.a).collect();
        for (handle, body) in self.bodies.iter_mut() {
            if body.kind == BodyKind::Static || !body.active || welded.contains(handle) {
                continue;
            }
            body.linear_velocity *= 1.0 / (1.0 + dt * body.linear_damping);
            body.angular_velocity *= 1.0 / (1.0 + dt * body.angular_damping);

            let center = body.world_center() + dt * body.linear_velocity;
            let angle = body.transform.angle + dt * body.angular_velocity;
            let position = center - Vec2::from_angle(angle).rotate(body.local_center);
            body.transform = Transform2::new(position, angle);
        }
    }

    /// Move every welded body onto its anchor and match its velocity
    fn solve_welds(&mut self) {
        let welds: Vec<WeldState> = self.joints.values().copied().collect();
        for w in welds {
            let Some(b) = self.bodies.get(&w.b) else { continue };
            let anchor = b.transform.apply(w.local_anchor_b);
            let angle = b.transform.angle - w.reference_angle;
            let omega = b.angular_velocity;
            let r = anchor - b.world_center();
            let velocity = b.linear_velocity + Vec2::new(-omega * r.y, omega * r.x);

            let Some(a) = self.bodies.get_mut(&w.a) else { continue };
            if a.kind == BodyKind::Static {
                continue;
            }
            let position = anchor - Vec2::from_angle(angle).rotate(w.local_anchor_a);
            a.transform = Transform2::new(position, angle);
            a.linear_velocity = velocity;
            a.angular_velocity = omega;
        }
    }

    fn detect_contacts(&mut self) {
        let joined: BTreeSet<(BodyHandle, BodyHandle)> = self
            .joints
            .values()
            .map(|j| if j.a < j.b { (j.a, j.b) } else { (j.b, j.a) })
            .collect();

        let shapes: Vec<(FixtureHandle, BodyHandle, bool, Vec<Vec2>)> = self
            .fixtures
            .iter()
            .filter_map(|(&h, f)| {
                let body = self.bodies.get(&f.body)?;
                if !body.active {
                    return None;
                }
                let world = f.vertices.iter().map(|&p| body.transform.apply(p)).collect();
                Some((h, f.body, body.kind == BodyKind::Static, world))
            })
            .collect();

        let mut now = BTreeSet::new();
        for (i, (fa, ba, static_a, pa)) in shapes.iter().enumerate() {
            for (fb, bb, static_b, pb) in &shapes[i + 1..] {
                if ba == bb || (*static_a && *static_b) {
                    continue;
                }
                let bodies = if ba < bb { (*ba, *bb) } else { (*bb, *ba) };
                if joined.contains(&bodies) || !polygons_overlap(pa, pb) {
                    continue;
                }
                let key = (*fa, *fb);
                if !self.touching.contains(&key) {
                    self.contacts.push(ContactPair { a: *fa, b: *fb });
                }
                now.insert(key);
            }
        }
        self.touching = now;
    }
}

impl PhysicsEngine for SandboxPhysics {
    fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        let handle = BodyHandle(self.next());
        self.bodies.insert(
            handle,
            BodyState {
                kind: def.kind,
                transform: Transform2::new(def.position, def.angle),
                linear_velocity: def.linear_velocity,
                angular_velocity: def.angular_velocity,
                linear_damping: def.linear_damping,
                angular_damping: def.angular_damping,
                active: true,
                mass: 0.0,
                local_center: Vec2::ZERO,
            },
        );
        handle
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        self.forget_contacts_of_body(body);
        assert!(self.bodies.remove(&body).is_some(), "unknown body {body:?}");
        self.fixtures.retain(|_, f| f.body != body);
        self.joints.retain(|_, j| j.a != body && j.b != body);
    }

    fn body_exists(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    fn create_polygon_fixture(
        &mut self,
        body: BodyHandle,
        vertices: &[Vec2],
        density: f32,
    ) -> FixtureHandle {
        assert!(vertices.len() >= 3, "polygon fixture needs at least 3 vertices");
        assert!(self.bodies.contains_key(&body), "unknown body {body:?}");
        let handle = FixtureHandle(self.next());
        self.fixtures.insert(
            handle,
            FixtureState {
                body,
                vertices: vertices.to_vec(),
                density,
            },
        );
        self.update_mass(body);
        handle
    }

    fn destroy_fixture(&mut self, fixture: FixtureHandle) {
        let Some(state) = self.fixtures.remove(&fixture) else {
            panic!("unknown fixture {fixture:?}");
        };
        self.touching.retain(|(a, b)| *a != fixture && *b != fixture);
        self.update_mass(state.body);
    }

    fn fixture_body(&self, fixture: FixtureHandle) -> Option<BodyHandle> {
        self.fixtures.get(&fixture).map(|f| f.body)
    }

    fn fixture_count(&self, body: BodyHandle) -> usize {
        self.fixtures.values().filter(|f| f.body == body).count()
    }

    fn transform(&self, body: BodyHandle) -> Transform2 {
        self.body(body).transform
    }

    fn set_transform(&mut self, body: BodyHandle, transform: Transform2) {
        self.body_mut(body).transform = transform;
    }

    fn world_center(&self, body: BodyHandle) -> Vec2 {
        self.body(body).world_center()
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vec2 {
        self.body(body).linear_velocity
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        let state = self.body_mut(body);
        if state.kind == BodyKind::Dynamic {
            state.linear_velocity = velocity;
        }
    }

    fn angular_velocity(&self, body: BodyHandle) -> f32 {
        self.body(body).angular_velocity
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, omega: f32) {
        let state = self.body_mut(body);
        if state.kind == BodyKind::Dynamic {
            state.angular_velocity = omega;
        }
    }

    fn set_active(&mut self, body: BodyHandle, active: bool) {
        self.body_mut(body).active = active;
        if !active {
            self.forget_contacts_of_body(body);
        }
    }

    fn is_active(&self, body: BodyHandle) -> bool {
        self.body(body).active
    }

    fn create_weld_joint(&mut self, a: BodyHandle, b: BodyHandle, anchor: Vec2) -> JointHandle {
        assert_ne!(a, b, "cannot weld a body to itself");
        let (xa, xb) = (self.body(a).transform, self.body(b).transform);
        let handle = JointHandle(self.next());
        self.joints.insert(
            handle,
            WeldState {
                a,
                b,
                local_anchor_a: xa.inverse_apply(anchor),
                local_anchor_b: xb.inverse_apply(anchor),
                reference_angle: xb.angle - xa.angle,
            },
        );
        // No contacts between welded bodies
        let fixtures = &self.fixtures;
        self.touching.retain(|(fa, fb)| {
            let pair = (fixtures.get(fa).map(|f| f.body), fixtures.get(fb).map(|f| f.body));
            pair != (Some(a), Some(b)) && pair != (Some(b), Some(a))
        });
        handle
    }

    fn destroy_joint(&mut self, joint: JointHandle) {
        assert!(self.joints.remove(&joint).is_some(), "unknown joint {joint:?}");
    }

    fn joints(&self, body: BodyHandle) -> Vec<(JointHandle, BodyHandle)> {
        self.joints
            .iter()
            .filter_map(|(&h, j)| {
                if j.a == body {
                    Some((h, j.b))
                } else if j.b == body {
                    Some((h, j.a))
                } else {
                    None
                }
            })
            .collect()
    }

    fn step(&mut self, dt: f32, _velocity_iterations: u32, _position_iterations: u32) {
        if dt > 0.0 {
            self.integrate(dt);
        }
        self.solve_welds();
        self.detect_contacts();
    }

    fn drain_contacts(&mut self) -> Vec<ContactPair> {
        std::mem::take(&mut self.contacts)
    }
}

/// Unsigned area and centroid of a simple polygon
pub fn polygon_area_centroid(vertices: &[Vec2]) -> (f32, Vec2) {
    let mut twice_area = 0.0;
    let mut weighted = Vec2::ZERO;
    let origin = vertices.first().copied().unwrap_or(Vec2::ZERO);
    for i in 0..vertices.len() {
        let p = vertices[i] - origin;
        let q = vertices[(i + 1) % vertices.len()] - origin;
        let cross = p.perp_dot(q);
        twice_area += cross;
        weighted += cross * (p + q);
    }
    if twice_area.abs() <= f32::EPSILON {
        let mean = vertices.iter().copied().sum::<Vec2>() / vertices.len().max(1) as f32;
        return (0.0, mean);
    }
    let centroid = origin + weighted / (3.0 * twice_area);
    (0.5 * twice_area.abs(), centroid)
}

fn project(polygon: &[Vec2], axis: Vec2) -> (f32, f32) {
    polygon
        .iter()
        .map(|p| p.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)))
}

/// Separating axis test for convex polygons. Shapes that only touch along an
/// edge or at a corner do not overlap.
pub fn polygons_overlap(a: &[Vec2], b: &[Vec2]) -> bool {
    for polygon in [a, b] {
        for i in 0..polygon.len() {
            let edge = polygon[(i + 1) % polygon.len()] - polygon[i];
            let axis = edge.perp();
            if axis == Vec2::ZERO {
                continue;
            }
            let (min_a, max_a) = project(a, axis);
            let (min_b, max_b) = project(b, axis);
            if max_a <= min_b || max_b <= min_a {
                return false;
            }
        }
    }
    true
}
