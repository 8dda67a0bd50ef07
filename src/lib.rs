//! Clickable: a small 3D scene of translucent circles that can be hovered,
//! dragged and destroyed with the mouse.
//!
//! The core is GPU-free. [`frame::FrameDriver`] runs the simulation and fills
//! [`commands::RenderCommands`], which any [`backend::RenderBackend`] can draw.

pub mod app;
pub mod arena;
pub mod backend;
pub mod camera;
pub mod commands;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod math;
pub mod picking;
pub mod pool;
pub mod renderer;
pub mod scene;
