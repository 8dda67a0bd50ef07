// Error types for Clickable

use thiserror::Error;

/// Arena allocation failures. The arena is left untouched when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("arena out of space: requested {requested} bytes, {remaining} remaining")]
    NoSpace { requested: usize, remaining: usize },

    #[error("array size overflows: {count} elements of {element_size} bytes")]
    Overflow { count: usize, element_size: usize },
}

/// Procedural mesh generation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error(
        "required {required_vertices} vertices and {required_indices} indices, \
         but there was only space for {remaining_vertices} and {remaining_indices}"
    )]
    OutOfSpace {
        required_vertices: usize,
        required_indices: usize,
        remaining_vertices: usize,
        remaining_indices: usize,
    },

    #[error("grid of {0}x{0} vertices cannot be indexed with 16-bit indices")]
    InvalidGridSize(u32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid camera: {0}")]
    InvalidCamera(String),

    #[error("capacity `{0}` must be greater than zero")]
    ZeroCapacity(&'static str),
}

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Top-level failure surfaced from `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Renderer(#[from] RendererError),

    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}
