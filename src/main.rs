//! Floe Break headless demo
//!
//! Loads settings (first argument, optional), floats a square sheet of ice
//! with a prop on it, and drives an agent straight through. Logs what breaks.
//!
//! ```text
//! RUST_LOG=info floe-break [settings.json]
//! ```

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use floe_break::level::{AgentPlacement, Bounds};
    use floe_break::physics::{PhysicsEngine, SandboxPhysics};
    use floe_break::{IceWorld, Level, SheetRecord, WorldEvent, WorldSettings};
    use glam::Vec2;

    /// Simulated seconds
    const RUN_SECONDS: f32 = 5.0;
    const AGENT_SPEED: f32 = 3.0;

    env_logger::init();
    log::info!("Floe Break (native) starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => WorldSettings::load(path),
        None => WorldSettings::default(),
    };

    let level = Level {
        sheets: vec![SheetRecord::rectangle(
            Vec2::new(-4.0, -4.0),
            Vec2::new(4.0, 4.0),
            settings.default_max_area,
        )],
        bounds: Some(Bounds {
            min: Vec2::new(-10.0, -10.0),
            max: Vec2::new(10.0, 10.0),
        }),
        agents: vec![AgentPlacement {
            position: Vec2::new(-6.0, 0.3),
            angle: 0.0,
            size: 0.8,
        }],
    };

    let prop_half_extent = settings.prop_half_extent;
    let mut world = IceWorld::new(SandboxPhysics::new(), settings);
    if let Err(e) = world.load_level(&level) {
        log::error!("Failed to load demo level: {e}");
        return;
    }
    world.add_prop_at(prop_half_extent, Vec2::new(2.0, 2.0), 0.0);

    let agents: Vec<_> = world.agents().collect();
    for &agent in &agents {
        world.physics_mut().set_linear_velocity(agent, Vec2::new(AGENT_SPEED, 0.0));
    }

    let steps = (RUN_SECONDS / world.settings().time_step).round() as u32;
    let (mut broken, mut broken_area) = (0usize, 0.0f32);
    for tick in 0..steps {
        world.step_fixed();
        for event in world.drain_events() {
            match event {
                WorldEvent::IceBroken { position, area, .. } => {
                    broken += 1;
                    broken_area += area;
                    log::info!(
                        "tick {tick}: ice broke at ({:.2}, {:.2}), area {area:.3}",
                        position.x,
                        position.y
                    );
                }
                WorldEvent::SheetSplit { from, into } => {
                    log::info!("tick {tick}: sheet {from:?} split into {} sheets", into.len());
                }
                WorldEvent::SheetSunk { body } => log::info!("tick {tick}: sheet {body:?} sank"),
                WorldEvent::PropTaken { agent, prop } => {
                    log::info!("tick {tick}: {agent:?} took prop {prop:?}")
                }
            }
        }
    }

    let remaining = world.total_ice_area();
    let sheets = world.sheet_count();
    println!("{steps} steps: {broken} chunks broken ({broken_area:.2} area)");
    println!("{sheets} sheets left ({remaining:.2} area)");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library only on the web; there is no headless demo there
}
