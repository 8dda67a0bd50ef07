// Frame orchestration: begin, simulate, hand off to a backend

use crate::backend::RenderBackend;
use crate::commands::{DropCounts, RenderCommands};
use crate::config::DemoConfig;
use crate::error::ConfigError;
use crate::input::InputState;
use crate::scene::{self, Scene};

/// What happened in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub draw_calls: u32,
    pub circle_count: u32,
    pub dropped: DropCounts,
}

/// Owns the scene and the command buffer and steps them one frame at a time.
#[derive(Debug)]
pub struct FrameDriver {
    scene: Scene,
    commands: RenderCommands,
}

impl FrameDriver {
    pub fn new(config: &DemoConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            scene: Scene::new(config)?,
            commands: RenderCommands::new(&config.commands),
        })
    }

    pub fn begin_frame(&mut self) {
        self.commands.begin_frame();
    }

    pub fn simulate(&mut self, input: &InputState, dt: f32) {
        scene::simulate_and_emit(&mut self.scene, &mut self.commands, input, dt);
    }

    pub fn end_frame(&mut self, backend: &mut impl RenderBackend) -> FrameReport {
        let draw_calls = backend.end_frame(&self.commands, &self.scene.assets);
        let dropped = self.commands.dropped();
        if dropped.total() > 0 {
            log::debug!("Dropped work this frame: {dropped:?}");
        }

        let report = FrameReport {
            draw_calls,
            circle_count: self.commands.circle_count(),
            dropped,
        };
        log::trace!("{report:?}");
        report
    }

    /// `begin_frame`, `simulate` and `end_frame` in one call.
    pub fn step(
        &mut self,
        backend: &mut impl RenderBackend,
        input: &InputState,
        dt: f32,
    ) -> FrameReport {
        self.begin_frame();
        self.simulate(input, dt);
        self.end_frame(backend)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn commands(&self) -> &RenderCommands {
        &self.commands
    }
}
