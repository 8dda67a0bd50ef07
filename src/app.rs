// Window event loop: feeds input to the frame driver and presents frames

use std::time::Instant;

use glam::{UVec2, Vec2};
use winit::{
    event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::config::DemoConfig;
use crate::error::AppError;
use crate::frame::{FrameDriver, FrameReport};
use crate::input::{Button, InputState};
use crate::renderer::Renderer;

const TITLE_REFRESH_SECS: f32 = 0.5;

fn key_button(code: KeyCode) -> Option<Button> {
    let button = match code {
        KeyCode::Space => Button::Spawn,
        KeyCode::Escape => Button::Delete,
        KeyCode::ArrowLeft => Button::TurnLeft,
        KeyCode::ArrowRight => Button::TurnRight,
        KeyCode::ArrowUp => Button::TurnUp,
        KeyCode::ArrowDown => Button::TurnDown,
        KeyCode::KeyW => Button::Forward,
        KeyCode::KeyS => Button::Back,
        KeyCode::KeyA => Button::StrafeLeft,
        KeyCode::KeyD => Button::StrafeRight,
        _ => return None,
    };
    Some(button)
}

fn mouse_button(button: MouseButton) -> Option<Button> {
    match button {
        MouseButton::Left => Some(Button::Primary),
        MouseButton::Right => Some(Button::Secondary),
        _ => None,
    }
}

/// Frame rate averaged over the title refresh interval.
#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: f32,
    frames: u32,
}

impl FpsCounter {
    fn tick(&mut self, dt: f32) -> Option<f32> {
        self.elapsed += dt;
        self.frames += 1;
        if self.elapsed < TITLE_REFRESH_SECS {
            return None;
        }
        let fps = self.frames as f32 / self.elapsed;
        *self = Self::default();
        Some(fps)
    }
}

pub struct App {
    renderer: Renderer,
    driver: FrameDriver,
    input: InputState,
    last_frame: Instant,
    fps: FpsCounter,
    title: String,
}

impl App {
    pub fn new(renderer: Renderer, config: &DemoConfig) -> Result<Self, AppError> {
        let size = renderer.size();
        Ok(Self {
            input: InputState::new(UVec2::new(size.width, size.height)),
            renderer,
            driver: FrameDriver::new(config)?,
            last_frame: Instant::now(),
            fps: FpsCounter::default(),
            title: config.window.title.clone(),
        })
    }

    pub fn run(mut self, event_loop: EventLoop<()>) -> Result<(), AppError> {
        event_loop.run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            let window_id = self.renderer.window().id();
            match event {
                Event::WindowEvent { window_id: id, event } if id == window_id => {
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::Resized(size) => {
                            self.renderer.resize(size);
                            self.input.viewport = UVec2::new(size.width, size.height);
                        }
                        WindowEvent::KeyboardInput { event, .. } => self.handle_key(event),
                        WindowEvent::MouseInput { state, button, .. } => {
                            if let Some(button) = mouse_button(button) {
                                self.input
                                    .set_button(button, state == ElementState::Pressed);
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            self.input.pointer = Vec2::new(position.x as f32, position.y as f32);
                        }
                        WindowEvent::RedrawRequested => self.frame(),
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    self.renderer.window().request_redraw();
                }
                _ => {}
            }
        })?;
        Ok(())
    }

    fn handle_key(&mut self, event: KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            if let Some(button) = key_button(code) {
                self.input
                    .set_button(button, event.state == ElementState::Pressed);
            }
        }
    }

    fn frame(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let report = self.driver.step(&mut self.renderer, &self.input, dt);
        self.input.end_frame();

        if let Some(fps) = self.fps.tick(dt) {
            self.update_title(&report, fps);
        }
    }

    fn update_title(&self, report: &FrameReport, fps: f32) {
        self.renderer.window().set_title(&format!(
            "{} | Circles: {} | fps: {:.0} | Draws: {}",
            self.title, report.circle_count, fps, report.draw_calls
        ));
    }
}
