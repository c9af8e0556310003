//! The ice world
//!
//! `IceWorld` owns the chunk graph and a physics engine and keeps them in
//! step: one dynamic body per sheet, one polygon fixture per bare chunk.
//! Agents break ice by touching it; props ride on the ice they sit on.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::state::{BatchStage, SheetBody, WorldEvent};
use crate::level::{Level, LevelError, is_valid_max_area};
use crate::physics::{
    BodyDef, BodyHandle, BodyKind, FixtureHandle, JointHandle, PhysicsEngine, Transform2,
};
use crate::settings::WorldSettings;
use crate::tessellation::{ChunkGraph, ChunkId, Sheet};

/// Chunk graph and physics world kept consistent with each other
#[derive(Debug)]
pub struct IceWorld<P: PhysicsEngine> {
    pub(crate) physics: P,
    pub(crate) graph: ChunkGraph,
    pub(crate) rng: Pcg32,
    pub(crate) settings: WorldSettings,
    pub(crate) sheets: BTreeMap<BodyHandle, SheetBody>,
    /// Reverse lookup for chunk fixtures
    pub(crate) fixture_owner: BTreeMap<FixtureHandle, (BodyHandle, ChunkId)>,
    pub(crate) agents: BTreeSet<BodyHandle>,
    pub(crate) props: BTreeSet<BodyHandle>,
    pub(crate) walls: BTreeSet<BodyHandle>,
    pub(crate) events: Vec<WorldEvent>,
    pub(crate) stage: BatchStage,
}

impl<P: PhysicsEngine> IceWorld<P> {
    pub fn new(physics: P, settings: WorldSettings) -> Self {
        Self {
            physics,
            graph: ChunkGraph::new(),
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            sheets: BTreeMap::new(),
            fixture_owner: BTreeMap::new(),
            agents: BTreeSet::new(),
            props: BTreeSet::new(),
            walls: BTreeSet::new(),
            events: Vec::new(),
            stage: BatchStage::Idle,
        }
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    /// Direct engine access, e.g. to steer agents. Do not destroy bodies or
    /// fixtures owned by sheets through this.
    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn graph(&self) -> &ChunkGraph {
        &self.graph
    }

    /// For building chunks before handing a sheet to [`Self::add_sheet`]
    pub fn graph_mut(&mut self) -> &mut ChunkGraph {
        &mut self.graph
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn stage(&self) -> BatchStage {
        self.stage
    }

    /// Ice bodies in handle order
    pub fn sheets(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.sheets.keys().copied()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, body: BodyHandle) -> Option<&Sheet> {
        self.sheets.get(&body).map(|b| &b.sheet)
    }

    /// Alive chunks of the sheet on `body`
    pub fn sheet_chunks(&mut self, body: BodyHandle) -> Vec<ChunkId> {
        match self.sheets.get_mut(&body) {
            Some(binding) => binding.sheet.chunks(&self.graph).iter().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.agents.iter().copied()
    }

    pub fn props(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.props.iter().copied()
    }

    pub fn walls(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.walls.iter().copied()
    }

    /// Every chunk fixture with its body and chunk
    pub fn chunk_fixtures(
        &self,
    ) -> impl Iterator<Item = (FixtureHandle, BodyHandle, ChunkId)> + '_ {
        self.fixture_owner.iter().map(|(&f, &(b, c))| (f, b, c))
    }

    pub fn chunk_fixture(&self, body: BodyHandle, chunk: ChunkId) -> Option<FixtureHandle> {
        self.sheets.get(&body)?.fixtures.get(&chunk).copied()
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Area of all ice still afloat
    pub fn total_ice_area(&mut self) -> f32 {
        let graph = &self.graph;
        self.sheets.values_mut().map(|b| b.sheet.compute_area(graph)).sum()
    }

    fn ice_body_def(&self, transform: Transform2) -> BodyDef {
        BodyDef {
            kind: BodyKind::Dynamic,
            position: transform.position,
            angle: transform.angle,
            linear_damping: self.settings.water_viscosity,
            angular_damping: self.settings.water_viscosity,
            ..Default::default()
        }
    }

    /// Add a sheet as a new body at the origin
    pub fn add_sheet(&mut self, sheet: Sheet) -> BodyHandle {
        self.add_sheet_at(sheet, Transform2::default())
    }

    /// Add a sheet as a new body with one fixture per bare chunk
    pub fn add_sheet_at(&mut self, sheet: Sheet, transform: Transform2) -> BodyHandle {
        let def = self.ice_body_def(transform);
        let body = self.physics.create_body(&def);
        let mut binding = SheetBody::new(sheet);
        let bare: Vec<ChunkId> = binding.sheet.bare_chunks(&self.graph).iter().copied().collect();
        self.sheets.insert(body, binding);
        for chunk in bare {
            self.create_chunk_fixture(body, chunk);
        }
        log::debug!("Added sheet body {body:?} with {} fixtures", self.physics.fixture_count(body));
        body
    }

    pub(crate) fn create_chunk_fixture(
        &mut self,
        body: BodyHandle,
        chunk: ChunkId,
    ) -> FixtureHandle {
        let vertices = self.graph.triangle(chunk).vertices();
        let fixture = self
            .physics
            .create_polygon_fixture(body, &vertices, self.settings.ice_density);
        if let Some(binding) = self.sheets.get_mut(&body) {
            binding.fixtures.insert(chunk, fixture);
        }
        self.fixture_owner.insert(fixture, (body, chunk));
        fixture
    }

    pub(crate) fn destroy_chunk_fixture(&mut self, body: BodyHandle, chunk: ChunkId) {
        let fixture = self.sheets.get_mut(&body).and_then(|b| b.fixtures.remove(&chunk));
        if let Some(fixture) = fixture {
            self.fixture_owner.remove(&fixture);
            self.physics.destroy_fixture(fixture);
        }
    }

    /// Destroy an ice body that has already been unbound from its sheet
    pub(crate) fn destroy_ice_body(
        &mut self,
        body: BodyHandle,
        fixtures: &BTreeMap<ChunkId, FixtureHandle>,
    ) {
        for fixture in fixtures.values() {
            self.fixture_owner.remove(fixture);
        }
        self.physics.destroy_body(body);
    }

    /// Add an agent: a dynamic body whose contacts break ice and take props
    pub fn add_agent(&mut self, vertices: &[Vec2], position: Vec2, angle: f32) -> BodyHandle {
        let body = self.physics.create_body(&BodyDef {
            position,
            angle,
            ..Default::default()
        });
        self.physics
            .create_polygon_fixture(body, vertices, self.settings.agent_density);
        self.agents.insert(body);
        body
    }

    /// Add a square agent of side `size`
    pub fn add_agent_box(&mut self, size: f32, position: Vec2, angle: f32) -> BodyHandle {
        let h = 0.5 * size;
        let vertices = [Vec2::new(-h, -h), Vec2::new(-h, h), Vec2::new(h, h), Vec2::new(h, -h)];
        self.add_agent(&vertices, position, angle)
    }

    /// Add a static wall polygon
    pub fn add_wall(&mut self, vertices: &[Vec2]) -> BodyHandle {
        let body = self.physics.create_body(&BodyDef {
            kind: BodyKind::Static,
            ..Default::default()
        });
        self.physics.create_polygon_fixture(body, vertices, 0.0);
        self.walls.insert(body);
        body
    }

    /// Drop a prop at a world position and weld it to the ice beneath, if any
    pub fn add_prop_at(&mut self, half_extent: f32, position: Vec2, angle: f32) -> BodyHandle {
        let h = half_extent;
        let body = self.physics.create_body(&BodyDef {
            position,
            angle,
            linear_damping: self.settings.water_viscosity,
            angular_damping: self.settings.water_viscosity,
            ..Default::default()
        });
        let vertices = [Vec2::new(-h, -h), Vec2::new(-h, h), Vec2::new(h, h), Vec2::new(h, -h)];
        self.physics
            .create_polygon_fixture(body, &vertices, self.settings.prop_density);
        self.props.insert(body);
        self.maybe_weld_prop(body);
        body
    }

    /// Weld a prop to the first ice body with a chunk under the prop's
    /// origin. Returns the joint, or `None` if the prop is over open water.
    pub fn maybe_weld_prop(&mut self, prop: BodyHandle) -> Option<JointHandle> {
        let position = self.physics.transform(prop).position;
        let graph = &self.graph;
        let mut target = None;
        for (&body, binding) in self.sheets.iter_mut() {
            let local = self.physics.transform(body).inverse_apply(position);
            if binding
                .sheet
                .chunks(graph)
                .iter()
                .any(|&c| graph.triangle(c).contains_point(local))
            {
                target = Some(body);
                break;
            }
        }
        let body = target?;
        log::debug!("Welding prop {prop:?} to ice body {body:?}");
        Some(self.physics.create_weld_joint(prop, body, position))
    }

    /// Props currently welded to `body`
    pub(crate) fn welded_props(&self, body: BodyHandle) -> Vec<(JointHandle, BodyHandle)> {
        self.physics
            .joints(body)
            .into_iter()
            .filter(|(_, other)| self.props.contains(other))
            .collect()
    }

    /// The ice body and chunk whose collision fixture contains a world point
    pub fn chunk_at(&self, point: Vec2) -> Option<(BodyHandle, ChunkId)> {
        self.fixture_owner.values().copied().find(|&(body, chunk)| {
            let local = self.physics.transform(body).inverse_apply(point);
            self.graph.triangle(chunk).contains_point(local)
        })
    }

    /// Outline of a sheet in world coordinates, for drawing
    pub fn sheet_outline(&mut self, body: BodyHandle) -> Option<Vec<Vec2>> {
        let binding = self.sheets.get_mut(&body)?;
        let xf = self.physics.transform(body);
        Some(binding.sheet.perimeter(&self.graph).iter().map(|&p| xf.apply(p)).collect())
    }

    /// Populate the world from a level: sheets, walls around the bounds, and
    /// agents. Every sheet record is checked before anything is added.
    pub fn load_level(&mut self, level: &Level) -> Result<Vec<BodyHandle>, LevelError> {
        for record in &level.sheets {
            record.validate()?;
        }
        let default_max_area = self.settings.default_max_area;
        let needs_default = level.sheets.iter().any(|r| r.max_area.is_none());
        if needs_default && !is_valid_max_area(default_max_area) {
            return Err(LevelError::BadMaxArea(default_max_area));
        }

        let mut bodies = Vec::new();
        for record in &level.sheets {
            match record.import(&mut self.graph)? {
                Some(mut sheet) => {
                    if record.max_area.is_none() {
                        sheet.set_max_area(default_max_area);
                    }
                    bodies.push(self.add_sheet(sheet));
                }
                None => log::warn!("Skipping level sheet with no ice left"),
            }
        }

        if let Some(bounds) = level.bounds {
            for wall in bounds.walls(self.settings.wall_thickness) {
                self.add_wall(&wall);
            }
        }

        for agent in &level.agents {
            self.add_agent_box(agent.size, agent.position, agent.angle);
        }

        log::info!(
            "Loaded level: {} sheets, {} agents, walls: {}",
            bodies.len(),
            level.agents.len(),
            level.bounds.is_some()
        );
        Ok(bodies)
    }
}
