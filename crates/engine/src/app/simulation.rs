use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::camera::{Camera, Viewport, CAMERA_ZOOM_STEP};
use super::entity::EntityId;
use super::input::{ActionStates, FrameEvent, Key};
use super::world::SceneWorld;

pub const DEFAULT_MOVE_SPEED: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    EscapePressed,
    Interrupted,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::QuitRequested => "window_close",
            StopReason::EscapePressed => "escape_key",
            StopReason::Interrupted => "interrupt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSettings {
    pub move_speed: f64,
    pub zoom_step: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            move_speed: DEFAULT_MOVE_SPEED,
            zoom_step: CAMERA_ZOOM_STEP,
        }
    }
}

/// What a frame changed that the display side has to react to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub resized: Option<Viewport>,
    pub rollbacks: u32,
}

/// Owns the world and camera and advances them one variable-length frame at a
/// time: events, held keys, integration, collision rollback, camera recenter.
/// Drawing is left to the caller, which reads `world()` and `camera()`.
#[derive(Debug)]
pub struct Simulation {
    world: SceneWorld,
    camera: Camera,
    player: EntityId,
    settings: SimulationSettings,
    state: LoopState,
    stop_reason: Option<StopReason>,
}

impl Simulation {
    pub fn new(
        world: SceneWorld,
        mut camera: Camera,
        player: EntityId,
        settings: SimulationSettings,
    ) -> Self {
        if camera.tracked().is_none() {
            camera.track(player);
        }
        let mut simulation = Self {
            world,
            camera,
            player,
            settings,
            state: LoopState::Running,
            stop_reason: None,
        };
        simulation.recenter_camera();
        simulation
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Stopping is terminal; later requests keep the first reason.
    pub fn request_stop(&mut self, reason: StopReason) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.stop_reason = Some(reason);
        info!(reason = reason.as_str(), "shutdown_requested");
    }

    /// Checked at the top of every frame. A raised flag stops the simulation
    /// before any input or integration runs. Returns whether it is still
    /// running.
    pub fn poll_interrupt(&mut self, interrupted: &AtomicBool) -> bool {
        if interrupted.load(Ordering::SeqCst) {
            self.request_stop(StopReason::Interrupted);
        }
        self.is_running()
    }

    /// Runs one full frame minus drawing.
    pub fn step(
        &mut self,
        dt_seconds: f64,
        events: &mut VecDeque<FrameEvent>,
        held: &ActionStates,
    ) -> FrameReport {
        let resized = self.handle_input(events, held);
        let rollbacks = self.update(dt_seconds);
        self.recenter_camera();
        FrameReport { resized, rollbacks }
    }

    /// Drains queued events until a quit is seen; anything queued after the
    /// quit stays in `events`. Held keys then set the player's velocity.
    /// Returns the last viewport size from a resize event, if any.
    pub fn handle_input(
        &mut self,
        events: &mut VecDeque<FrameEvent>,
        held: &ActionStates,
    ) -> Option<Viewport> {
        let mut resized = None;
        while let Some(event) = events.pop_front() {
            match event {
                FrameEvent::Quit => {
                    self.request_stop(StopReason::QuitRequested);
                    break;
                }
                FrameEvent::KeyDown(Key::Escape) => {
                    self.request_stop(StopReason::EscapePressed);
                    break;
                }
                FrameEvent::KeyDown(Key::ZoomIn) => {
                    self.camera.adjust_zoom(1, self.settings.zoom_step);
                    debug!(zoom = self.camera.zoom(), "zoom_changed");
                }
                FrameEvent::KeyDown(Key::ZoomOut) => {
                    if self.camera.adjust_zoom(-1, self.settings.zoom_step) {
                        debug!(zoom = self.camera.zoom(), "zoom_changed");
                    }
                }
                FrameEvent::KeyDown(Key::Other) => {}
                FrameEvent::Resized { width, height } => {
                    self.camera.resize(width, height);
                    resized = Some(self.camera.viewport());
                }
            }
        }

        let velocity = held.velocity(self.settings.move_speed);
        if let Some(player) = self.world.find_entity_mut(self.player) {
            player.set_velocity(velocity.x, velocity.y);
        }
        resized
    }

    pub fn update(&mut self, dt_seconds: f64) -> u32 {
        self.world.integrate_and_resolve(dt_seconds)
    }

    pub fn recenter_camera(&mut self) {
        let Some(tracked) = self.camera.tracked() else {
            return;
        };
        if let Some(entity) = self.world.find_entity(tracked) {
            self.camera.center_on(entity.center());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::collision::CollisionWorld;
    use crate::app::entity::Entity;
    use crate::app::geometry::{Rect, Vec2};
    use crate::app::input::InputAction;

    const HERO_SIZE: Vec2 = Vec2::new(32.0, 32.0);

    fn simulation_with_walls(start: Vec2, walls: Vec<Rect>) -> Simulation {
        let mut world = SceneWorld::new(None, CollisionWorld::new(walls));
        let player = world.spawn(start, HERO_SIZE, None);
        Simulation::new(
            world,
            Camera::new(Viewport::new(800, 600)),
            player,
            SimulationSettings::default(),
        )
    }

    fn player_position(simulation: &Simulation) -> Vec2 {
        simulation
            .world()
            .find_entity(simulation.player())
            .map(Entity::position)
            .expect("player")
    }

    #[test]
    fn moves_right_when_nothing_is_in_the_way() {
        let mut simulation = simulation_with_walls(Vec2::new(100.0, 100.0), Vec::new());
        let held = ActionStates::default().with_down(InputAction::MoveRight);

        simulation.step(0.1, &mut VecDeque::new(), &held);

        assert_eq!(player_position(&simulation), Vec2::new(120.0, 100.0));
    }

    #[test]
    fn wall_under_the_feet_cancels_the_move() {
        let mut simulation = simulation_with_walls(
            Vec2::new(100.0, 100.0),
            vec![Rect::new(110.0, 90.0, 40.0, 40.0)],
        );
        let held = ActionStates::default().with_down(InputAction::MoveRight);

        let report = simulation.step(0.1, &mut VecDeque::new(), &held);

        assert_eq!(report.rollbacks, 1);
        assert_eq!(player_position(&simulation), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn camera_follows_post_collision_position() {
        let mut simulation = simulation_with_walls(Vec2::new(100.0, 100.0), Vec::new());
        let held = ActionStates::default()
            .with_down(InputAction::MoveDown)
            .with_down(InputAction::MoveLeft);

        simulation.step(0.5, &mut VecDeque::new(), &held);

        let center = simulation
            .world()
            .find_entity(simulation.player())
            .map(Entity::center)
            .expect("player");
        assert_eq!(center, Vec2::new(16.0, 216.0));
        let screen = simulation.camera().world_to_screen(center);
        assert!((screen.x - 400.0).abs() < 1e-9 && (screen.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn quit_mid_queue_stops_and_leaves_later_events_unprocessed() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        let mut events = VecDeque::from([
            FrameEvent::KeyDown(Key::ZoomIn),
            FrameEvent::Quit,
            FrameEvent::KeyDown(Key::ZoomIn),
            FrameEvent::Resized {
                width: 320,
                height: 240,
            },
        ]);

        let resized = simulation.handle_input(&mut events, &ActionStates::default());

        assert_eq!(simulation.state(), LoopState::Stopped);
        assert_eq!(simulation.stop_reason(), Some(StopReason::QuitRequested));
        assert_eq!(simulation.camera().zoom(), 1.25);
        assert_eq!(resized, None);
        assert_eq!(simulation.camera().viewport(), Viewport::new(800, 600));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn escape_stops_and_stop_is_terminal() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        let mut events = VecDeque::from([FrameEvent::KeyDown(Key::Escape)]);

        simulation.handle_input(&mut events, &ActionStates::default());
        simulation.request_stop(StopReason::Interrupted);

        assert!(!simulation.is_running());
        assert_eq!(simulation.stop_reason(), Some(StopReason::EscapePressed));
    }

    #[test]
    fn frame_after_quit_still_moves_the_player() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        let mut events = VecDeque::from([FrameEvent::Quit]);
        let held = ActionStates::default().with_down(InputAction::MoveRight);

        simulation.step(0.1, &mut events, &held);

        assert_eq!(simulation.state(), LoopState::Stopped);
        assert_eq!(player_position(&simulation), Vec2::new(20.0, 0.0));
    }

    #[test]
    fn zoom_keys_step_by_quarter_and_never_reach_zero() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        let mut events: VecDeque<_> = std::iter::repeat(FrameEvent::KeyDown(Key::ZoomOut))
            .take(10)
            .collect();

        simulation.handle_input(&mut events, &ActionStates::default());

        assert_eq!(simulation.camera().zoom(), 0.25);
        assert!(simulation.is_running());
    }

    #[test]
    fn resize_updates_viewport_and_is_reported() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        let mut events = VecDeque::from([
            FrameEvent::Resized {
                width: 1024,
                height: 768,
            },
            FrameEvent::KeyDown(Key::Other),
        ]);

        let report = simulation.step(0.0, &mut events, &ActionStates::default());

        assert_eq!(report.resized, Some(Viewport::new(1024, 768)));
        assert_eq!(simulation.camera().viewport(), Viewport::new(1024, 768));
        assert!(events.is_empty());
    }

    #[test]
    fn releasing_keys_zeroes_velocity() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        let held = ActionStates::default().with_down(InputAction::MoveUp);
        simulation.step(0.1, &mut VecDeque::new(), &held);
        simulation.step(0.1, &mut VecDeque::new(), &ActionStates::default());

        assert_eq!(player_position(&simulation), Vec2::new(0.0, -20.0));
    }

    #[test]
    fn raised_interrupt_flag_stops_before_the_frame_runs() {
        let mut simulation = simulation_with_walls(Vec2::new(100.0, 100.0), Vec::new());
        let flag = AtomicBool::new(false);
        assert!(simulation.poll_interrupt(&flag));

        flag.store(true, Ordering::SeqCst);
        let still_running = simulation.poll_interrupt(&flag);

        assert!(!still_running);
        assert_eq!(simulation.state(), LoopState::Stopped);
        assert_eq!(simulation.stop_reason(), Some(StopReason::Interrupted));
        assert_eq!(player_position(&simulation), Vec2::new(100.0, 100.0));
    }

    #[test]
    fn interrupt_after_quit_keeps_the_quit_reason() {
        let mut simulation = simulation_with_walls(Vec2::ZERO, Vec::new());
        simulation.handle_input(
            &mut VecDeque::from([FrameEvent::Quit]),
            &ActionStates::default(),
        );

        assert!(!simulation.poll_interrupt(&AtomicBool::new(true)));
        assert_eq!(simulation.stop_reason(), Some(StopReason::QuitRequested));
    }
}
