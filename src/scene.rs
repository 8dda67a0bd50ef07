// Scene state and the per-frame simulate-and-emit pass

use glam::{Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::camera::Camera;
use crate::commands::RenderCommands;
use crate::config::{DemoConfig, SimulationConfig};
use crate::error::ConfigError;
use crate::geometry::{AssetStore, MeshSlot};
use crate::input::{Button, InputState};
use crate::math::BoundingBox;
use crate::picking::{self, PickHit};
use crate::pool::{Circle, CircleId, CirclePool};

const HIGHLIGHT: Vec4 = Vec4::ONE;

/// Everything that persists between frames.
#[derive(Debug)]
pub struct Scene {
    pub assets: AssetStore,
    pub pool: CirclePool,
    pub camera: Camera,
    rng: ChaCha8Rng,
    test_box: BoundingBox,
    uploads_pending: bool,
    simulation: SimulationConfig,
}

impl Scene {
    /// Builds the camera and pool and loads every static mesh.
    pub fn new(config: &DemoConfig) -> Result<Self, ConfigError> {
        let camera = Camera::new(&config.camera)?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut assets = AssetStore::new(
            config.assets.vertex_arena_bytes,
            config.assets.index_arena_bytes,
        );
        assets.load_assets(&config.assets, &mut rng);

        let test_box = assets
            .mesh(MeshSlot::TestPlane)
            .map(|mesh| assets.mesh_bounding_box(&mesh))
            .unwrap_or_default();

        log::debug!(
            "Scene ready: {} meshes, pool of {} circles",
            assets.loaded().count(),
            config.pool.capacity
        );

        Ok(Self {
            assets,
            pool: CirclePool::new(config.pool.capacity),
            camera,
            rng,
            test_box,
            uploads_pending: true,
            simulation: config.simulation,
        })
    }

    pub fn test_box(&self) -> BoundingBox {
        self.test_box
    }

    /// Creates a circle with random color, position, heading and size.
    pub fn spawn_circle(&mut self) -> Option<CircleId> {
        let id = self.pool.create()?;
        let rng = &mut self.rng;

        let color = Vec4::new(rng.gen(), rng.gen(), rng.gen(), 0.5);
        let position = Vec3::new(
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
            rng.gen_range(-5.0..5.0),
        );
        let heading = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let radius = rng.gen_range(0.35..1.15);

        if let Some(circle) = self.pool.get_mut(id) {
            *circle = Circle {
                color,
                position,
                velocity: heading.try_normalize().unwrap_or(Vec3::X),
                radius,
            };
        }
        Some(id)
    }

    fn update_camera(&mut self, input: &InputState, dt: f32) {
        let turn = self.simulation.camera_turn_speed * dt;
        let step = self.simulation.camera_move_speed * dt;
        let camera = &mut self.camera;

        if input.down(Button::TurnLeft) {
            camera.rotate(turn, camera.up());
        }
        if input.down(Button::TurnRight) {
            camera.rotate(-turn, camera.up());
        }
        if input.down(Button::TurnUp) {
            camera.rotate(turn, camera.right());
        }
        if input.down(Button::TurnDown) {
            camera.rotate(-turn, camera.right());
        }

        let mut movement = Vec3::ZERO;
        if input.down(Button::Forward) {
            movement += camera.target();
        }
        if input.down(Button::Back) {
            movement -= camera.target();
        }
        if input.down(Button::StrafeRight) {
            movement += camera.right();
        }
        if input.down(Button::StrafeLeft) {
            movement -= camera.right();
        }
        camera.position += step * movement;
    }
}

/// Runs one frame of simulation and records what to draw into `commands`.
///
/// `commands` must have been reset with [`RenderCommands::begin_frame`].
pub fn simulate_and_emit(
    scene: &mut Scene,
    commands: &mut RenderCommands,
    input: &InputState,
    dt: f32,
) {
    if scene.uploads_pending {
        for (slot, mesh) in scene.assets.loaded() {
            commands.push_upload_request(slot, mesh);
        }
        scene.uploads_pending = false;
    }

    scene.update_camera(input, dt);
    if input.has_viewport() {
        let viewport = input.viewport.as_vec2();
        commands.set_world_transform(scene.camera.world_transform(viewport.x / viewport.y));
    }

    if input.down(Button::Delete) {
        if let Some(first) = scene.pool.first_active() {
            scene.pool.destroy(first);
        }
    }
    if input.down(Button::Spawn) && scene.spawn_circle().is_none() {
        log::debug!("Circle pool exhausted");
    }

    if scene.assets.mesh(MeshSlot::TestPlane).is_some() {
        commands.push_mesh_entry(MeshSlot::TestPlane);
        commands.push_bounding_box(&scene.test_box);
    }
    commands.push_axes(Vec3::ZERO);

    let ray = picking::cursor_ray(&scene.camera, input);
    let primary_down = input.down(Button::Primary);
    let speed = scene.simulation.circle_speed;

    let mut next = scene.pool.first_active();
    while let Some(id) = next {
        next = scene.pool.next_active(id);

        let Some(circle) = scene.pool.get(id).copied() else {
            continue;
        };
        let hit: Option<PickHit> = ray
            .as_ref()
            .and_then(|ray| picking::pick(ray, circle.position));

        if let Some(hit) = &hit {
            picking::offer_hover(&mut scene.pool, id, hit);
        }
        if let Some(circle) = scene.pool.get_mut(id) {
            circle.position += speed * dt * circle.velocity;
        }

        let highlighted = picking::interact(&mut scene.pool, id, hit.as_ref(), primary_down);

        if let Some(circle) = scene.pool.get(id) {
            let color = if highlighted { HIGHLIGHT } else { circle.color };
            commands.push_circle(circle.position, Vec2::splat(2.0 * circle.radius), color);
        }
    }

    if input.pressed(Button::Secondary) {
        if let Some(hot) = scene.pool.hot() {
            scene.pool.destroy(hot);
        }
    }

    commands.set_circle_count(scene.pool.len() as u32);
}
