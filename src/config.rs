// Configuration loaded once at startup

use std::f32::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable consulted when no config path is given on the command line.
pub const CONFIG_ENV_VAR: &str = "CLICKABLE_CONFIG";

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Seed for spawn colors, positions and mesh jitter.
    pub seed: u64,
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub assets: AssetConfig,
    pub commands: CommandCapacity,
    pub pool: PoolConfig,
    pub simulation: SimulationConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: 12,
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            assets: AssetConfig::default(),
            commands: CommandCapacity::default(),
            pool: PoolConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Loads from the first command line argument, then `CLICKABLE_CONFIG`,
    /// falling back to the defaults when neither is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());

        match path {
            Some(path) => {
                log::info!("Loading config from {path}");
                Self::load(path)
            }
            None => {
                log::info!("Using default config");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::camera::Camera::new(&self.camera)?;

        let capacities = [
            ("assets.vertex_arena_bytes", self.assets.vertex_arena_bytes),
            ("assets.index_arena_bytes", self.assets.index_arena_bytes),
            ("commands.line_vertices", self.commands.line_vertices),
            ("commands.line_indices", self.commands.line_indices),
            ("commands.quad_vertices", self.commands.quad_vertices),
            ("commands.quad_indices", self.commands.quad_indices),
            ("commands.entries", self.commands.entries),
            ("commands.uploads", self.commands.uploads),
            ("pool.capacity", self.pool.capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Clickable".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: PI / 2.0,
            near: -0.5,
            far: -100.0,
            position: [0.0, 0.0, 10.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub vertex_arena_bytes: usize,
    pub index_arena_bytes: usize,
    pub plane_width: f32,
    pub plane_height: f32,
    /// Vertices along each side of the test plane.
    pub plane_vertex_count: u32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            vertex_arena_bytes: 12 * MIB,
            index_arena_bytes: 12 * MIB,
            plane_width: 8.0,
            plane_height: 6.0,
            plane_vertex_count: 24,
        }
    }
}

/// Fixed capacities of the per-frame command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandCapacity {
    pub line_vertices: usize,
    pub line_indices: usize,
    pub quad_vertices: usize,
    pub quad_indices: usize,
    pub entries: usize,
    pub uploads: usize,
}

impl Default for CommandCapacity {
    fn default() -> Self {
        Self {
            line_vertices: 1 << 16,
            line_indices: 1 << 16,
            quad_vertices: 1 << 20,
            quad_indices: 3 << 19,
            entries: 1 << 10,
            uploads: 1 << 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 1 << 16 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Scale applied to circle velocities per second.
    pub circle_speed: f32,
    /// Radians per second for the arrow keys.
    pub camera_turn_speed: f32,
    /// World units per second for W/A/S/D.
    pub camera_move_speed: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            circle_speed: 0.25,
            camera_turn_speed: 1.0,
            camera_move_speed: 5.0,
        }
    }
}
