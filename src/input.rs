// Per-frame input snapshot fed by the windowing layer

use glam::{UVec2, Vec2};

/// Logical buttons the demo reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Drag the hot circle.
    Primary,
    /// Destroy the hot circle.
    Secondary,
    Spawn,
    /// Destroy the most recently created circle.
    Delete,
    TurnLeft,
    TurnRight,
    TurnUp,
    TurnDown,
    Forward,
    Back,
    StrafeLeft,
    StrafeRight,
}

impl Button {
    pub const COUNT: usize = 12;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub down: bool,
    pub was_down: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    buttons: [ButtonState; Button::COUNT],
    /// Pointer position in pixels, origin top-left.
    pub pointer: Vec2,
    /// Viewport size in pixels.
    pub viewport: UVec2,
}

impl InputState {
    pub fn new(viewport: UVec2) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn set_button(&mut self, button: Button, down: bool) {
        self.buttons[button as usize].down = down;
    }

    pub fn down(&self, button: Button) -> bool {
        self.buttons[button as usize].down
    }

    /// Went down since the previous frame.
    pub fn pressed(&self, button: Button) -> bool {
        let state = self.buttons[button as usize];
        state.down && !state.was_down
    }

    pub fn has_viewport(&self) -> bool {
        self.viewport.x > 0 && self.viewport.y > 0
    }

    /// Call once the frame has consumed the input.
    pub fn end_frame(&mut self) {
        for state in &mut self.buttons {
            state.was_down = state.down;
        }
    }
}
