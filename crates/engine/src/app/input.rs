use super::geometry::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

const ACTION_COUNT: usize = 4;

/// Continuous held-key state, sampled once per frame after discrete events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub fn with_down(mut self, action: InputAction) -> Self {
        self.set(action, true);
        self
    }

    /// Per-axis velocity. Up wins over down and left over right when both are
    /// held. Axes are independent, so diagonals move at `speed * sqrt(2)`.
    pub fn velocity(&self, speed: f64) -> Vec2 {
        Vec2::new(
            axis_velocity(
                self.is_down(InputAction::MoveLeft),
                self.is_down(InputAction::MoveRight),
                speed,
            ),
            axis_velocity(
                self.is_down(InputAction::MoveUp),
                self.is_down(InputAction::MoveDown),
                speed,
            ),
        )
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
        }
    }
}

fn axis_velocity(negative_held: bool, positive_held: bool, speed: f64) -> f64 {
    if negative_held {
        -speed
    } else if positive_held {
        speed
    } else {
        0.0
    }
}

/// Keys with a discrete meaning on key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    ZoomIn,
    ZoomOut,
    Other,
}

/// Discrete window/input event queued between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Quit,
    KeyDown(Key),
    Resized { width: u32, height: u32 },
}
