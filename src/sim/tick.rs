//! Per-step contact pipeline
//!
//! After every physics step the begin-contact pairs go through one batch:
//! Collect bumped chunk fixtures per ice body and deactivate those bodies,
//! Classify each chunk as split or delete, Mutate the chunk graph, then
//! Resync bodies and fixtures with the resulting sheets. Props bumped by an
//! agent are taken afterwards.

use std::collections::BTreeMap;

use glam::Vec2;

use super::contact::{Bumps, FixtureRole, sort_contacts};
use super::state::{BatchStage, SheetBody, WorldEvent};
use super::world::IceWorld;
use crate::physics::{BodyHandle, ContactPair, FixtureHandle, PhysicsEngine};
use crate::tessellation::{ChunkId, Sheet};

/// Bumped chunks of one ice body, sorted by what happens to them
#[derive(Debug)]
struct BodyBatch {
    body: BodyHandle,
    split: Vec<ChunkId>,
    doomed: Vec<ChunkId>,
    /// Filled in by Mutate when `doomed` is not empty
    removal: Option<Removal>,
}

/// What was left of a body's sheet after deleting chunks
#[derive(Debug)]
struct Removal {
    survivors: Vec<Sheet>,
    fixtures: BTreeMap<ChunkId, FixtureHandle>,
}

/// Velocity of a point at offset `r` from the center of a body moving with
/// `linear` and spinning at `omega`
pub fn split_velocity(linear: Vec2, omega: f32, r: Vec2) -> Vec2 {
    linear + Vec2::new(-omega * r.y, omega * r.x)
}

impl<P: PhysicsEngine> IceWorld<P> {
    /// Step with the iteration counts and time step from the settings
    pub fn step_fixed(&mut self) {
        let (dt, vi, pi) = (
            self.settings.time_step,
            self.settings.velocity_iterations,
            self.settings.position_iterations,
        );
        self.step(dt, vi, pi);
    }

    /// Advance the physics engine, then break whatever the agents touched
    pub fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) {
        assert_eq!(self.stage, BatchStage::Idle, "step called during a contact batch");
        self.physics.step(dt, velocity_iterations, position_iterations);
        let pairs = self.physics.drain_contacts();
        self.process_contacts(&pairs);
    }

    fn fixture_role(&self, fixture: FixtureHandle) -> FixtureRole {
        if let Some(&(body, chunk)) = self.fixture_owner.get(&fixture) {
            return FixtureRole::Chunk { body, chunk };
        }
        match self.physics.fixture_body(fixture) {
            Some(body) if self.agents.contains(&body) => FixtureRole::Agent(body),
            Some(body) if self.props.contains(&body) => FixtureRole::Prop(body),
            _ => FixtureRole::Other,
        }
    }

    /// Run one contact batch. Graph and physics are consistent again when
    /// this returns.
    pub fn process_contacts(&mut self, pairs: &[ContactPair]) {
        assert_eq!(self.stage, BatchStage::Idle, "contact batch started during another batch");
        let bumps = sort_contacts(pairs, |f| self.fixture_role(f));
        if bumps.is_empty() {
            return;
        }

        if !bumps.chunks.is_empty() {
            self.stage = BatchStage::Collect;
            let touched = self.collect(&bumps);

            self.stage = BatchStage::Classify;
            let mut batches = self.classify(touched);

            self.stage = BatchStage::Mutate;
            for batch in &mut batches {
                self.mutate(batch);
            }

            self.stage = BatchStage::Resync;
            let mut loose = Vec::new();
            for batch in batches {
                self.resync(batch, &mut loose);
            }
            for prop in loose {
                if self.props.contains(&prop) {
                    self.maybe_weld_prop(prop);
                }
            }

            let freed = self.graph.collect_garbage();
            log::debug!("Contact batch done, {freed} chunk slots reclaimed");
            self.stage = BatchStage::Idle;
        }

        for (&prop, &agent) in &bumps.props {
            self.take_prop(agent, prop);
        }
    }

    fn collect(&mut self, bumps: &Bumps) -> Vec<(BodyHandle, Vec<ChunkId>)> {
        let mut touched = Vec::with_capacity(bumps.chunks.len());
        for (&body, fixtures) in &bumps.chunks {
            let chunks: Vec<ChunkId> = fixtures
                .iter()
                .filter_map(|f| self.fixture_owner.get(f))
                .map(|&(_, chunk)| chunk)
                .collect();
            // The body is about to change one way or another
            self.physics.set_active(body, false);
            touched.push((body, chunks));
        }
        touched
    }

    fn classify(&self, touched: Vec<(BodyHandle, Vec<ChunkId>)>) -> Vec<BodyBatch> {
        touched
            .into_iter()
            .filter_map(|(body, chunks)| {
                let max_area = self.sheets.get(&body)?.sheet.max_area();
                let (split, doomed): (Vec<ChunkId>, Vec<ChunkId>) = chunks
                    .into_iter()
                    .partition(|&c| self.graph.triangle(c).area() >= max_area);
                Some(BodyBatch {
                    body,
                    split,
                    doomed,
                    removal: None,
                })
            })
            .collect()
    }

    fn mutate(&mut self, batch: &mut BodyBatch) {
        for &chunk in &batch.split {
            self.split_chunk(batch.body, chunk);
        }
        if batch.doomed.is_empty() {
            return;
        }

        let xf = self.physics.transform(batch.body);
        for &chunk in &batch.doomed {
            let triangle = self.graph.triangle(chunk);
            self.events.push(WorldEvent::IceBroken {
                body: batch.body,
                chunk,
                position: xf.apply(triangle.centroid()),
                area: triangle.area(),
            });
        }

        let Some(binding) = self.sheets.remove(&batch.body) else {
            return;
        };
        let survivors = binding.sheet.remove_chunks(&mut self.graph, &batch.doomed);
        batch.removal = Some(Removal {
            survivors,
            fixtures: binding.fixtures,
        });
    }

    /// Split a chunk too big to break off and swap its fixture for one per
    /// bare half
    fn split_chunk(&mut self, body: BodyHandle, chunk: ChunkId) {
        let Some(binding) = self.sheets.get_mut(&body) else {
            return;
        };
        let halves = binding.sheet.random_binary_division(&mut self.graph, chunk, &mut self.rng);
        self.destroy_chunk_fixture(body, chunk);
        for half in halves {
            if self.graph.chunk(half).has_bare_edge() {
                self.create_chunk_fixture(body, half);
            }
        }
    }

    fn resync(&mut self, batch: BodyBatch, loose: &mut Vec<BodyHandle>) {
        let body = batch.body;
        let Some(Removal {
            mut survivors,
            mut fixtures,
        }) = batch.removal
        else {
            self.physics.set_active(body, true);
            return;
        };

        match survivors.len() {
            0 => {
                self.destroy_ice_body(body, &fixtures);
                self.events.push(WorldEvent::SheetSunk { body });
            }
            1 => {
                let mut sheet = survivors.remove(0);
                let bare = sheet.bare_chunks(&self.graph).clone();
                let stale: Vec<ChunkId> = fixtures
                    .keys()
                    .copied()
                    .filter(|c| !bare.contains(c))
                    .collect();
                for chunk in stale {
                    if let Some(fixture) = fixtures.remove(&chunk) {
                        self.fixture_owner.remove(&fixture);
                        self.physics.destroy_fixture(fixture);
                    }
                }
                self.sheets.insert(body, SheetBody { sheet, fixtures });
                for chunk in bare {
                    if self.chunk_fixture(body, chunk).is_none() {
                        self.create_chunk_fixture(body, chunk);
                    }
                }

                if self.physics.fixture_count(body) == 0 {
                    let binding = self.sheets.remove(&body);
                    self.destroy_ice_body(body, &binding.map(|b| b.fixtures).unwrap_or_default());
                    self.events.push(WorldEvent::SheetSunk { body });
                    return;
                }
                self.physics.set_active(body, true);
                for (joint, prop) in self.welded_props(body) {
                    self.physics.destroy_joint(joint);
                    loose.push(prop);
                }
            }
            _ => {
                for (_, prop) in self.welded_props(body) {
                    loose.push(prop);
                }
                let into = self.replace_body(body, &fixtures, survivors);
                log::info!("Ice body {body:?} split into {} bodies", into.len());
                self.events.push(WorldEvent::SheetSplit { from: body, into });
            }
        }
    }

    /// Destroy `body` and create one body per sheet in the same place, each
    /// moving the way its part of the old body was moving
    fn replace_body(
        &mut self,
        body: BodyHandle,
        fixtures: &BTreeMap<ChunkId, FixtureHandle>,
        sheets: Vec<Sheet>,
    ) -> Vec<BodyHandle> {
        let xf = self.physics.transform(body);
        let v0 = self.physics.linear_velocity(body);
        let omega0 = self.physics.angular_velocity(body);
        let center0 = self.physics.world_center(body);
        self.destroy_ice_body(body, fixtures);

        sheets
            .into_iter()
            .map(|sheet| {
                let new_body = self.add_sheet_at(sheet, xf);
                let r = self.physics.world_center(new_body) - center0;
                self.physics.set_linear_velocity(new_body, split_velocity(v0, omega0, r));
                self.physics.set_angular_velocity(new_body, omega0);
                new_body
            })
            .collect()
    }

    fn take_prop(&mut self, agent: BodyHandle, prop: BodyHandle) {
        if !self.props.remove(&prop) {
            return;
        }
        self.physics.destroy_body(prop);
        log::debug!("Agent {agent:?} took prop {prop:?}");
        self.events.push(WorldEvent::PropTaken { agent, prop });
    }
}
