use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::asset_names::validate_asset_name;
use crate::content::{load_image_rgba, load_tmx};
use crate::{resolve_app_paths, AppPaths, StartupError};

use super::metrics::FrameStatsAccumulator;
use super::rendering::{RenderAssets, Renderer};
use super::{
    ActionStates, Camera, CameraError, CollisionWorld, EntityId, FrameEvent, InputAction, Key,
    SceneWorld, Simulation, SimulationSettings, SpriteId, Vec2, Viewport,
    CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_STEP, DEFAULT_MOVE_SPEED,
};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// File names under the data directory.
    pub map_file: String,
    pub hero_image: String,
    pub move_speed: f64,
    pub zoom_step: f64,
    pub initial_zoom: f64,
    pub frame_stats_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Grasslands".to_string(),
            window_width: 800,
            window_height: 600,
            map_file: "grasslands.tmx".to_string(),
            hero_image: "hero.png".to_string(),
            move_speed: DEFAULT_MOVE_SPEED,
            zoom_step: CAMERA_ZOOM_STEP,
            initial_zoom: CAMERA_ZOOM_DEFAULT,
            frame_stats_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("invalid initial zoom: {0}")]
    InitialZoom(#[source] CameraError),
    #[error("failed to install interrupt handler: {0}")]
    InterruptHandler(#[source] ctrlc::Error),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("failed to resize renderer: {0}")]
    ResizeRenderer(#[source] PixelsError),
    #[error("failed to draw frame: {0}")]
    Render(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Loads the map and sprites, opens the window and runs frames until the
/// simulation stops. Render faults end the loop and are returned here.
pub fn run_app(config: LoopConfig) -> Result<(), AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        data_dir = %app_paths.data_dir.display(),
        "startup"
    );
    let (world, assets, player) = load_scene(&app_paths, &config)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupt_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || interrupt_flag.store(true, Ordering::SeqCst))
        .map_err(AppError::InterruptHandler)?;

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let window_for_loop = Arc::clone(&window);
    let mut renderer = Renderer::new(window, assets).map_err(AppError::CreateRenderer)?;

    let mut camera = Camera::new(renderer.viewport());
    camera
        .set_zoom(config.initial_zoom)
        .map_err(AppError::InitialZoom)?;
    let settings = SimulationSettings {
        move_speed: config.move_speed,
        zoom_step: config.zoom_step,
    };
    let mut simulation = Simulation::new(world, camera, player, settings);
    info!(
        entity_count = simulation.world().entity_count(),
        obstacle_count = simulation.world().collision().len(),
        zoom = simulation.camera().zoom(),
        move_speed = settings.move_speed,
        "scene_loaded"
    );

    event_loop.set_control_flow(ControlFlow::Poll);

    let mut input_collector = InputCollector::default();
    let mut frame_clock = FrameClock::new(Instant::now());
    let mut frame_stats = FrameStatsAccumulator::new(normalize_non_zero_duration(
        config.frame_stats_interval,
        Duration::from_secs(1),
    ));
    let mut runtime_error: Option<AppError> = None;
    let runtime_error_slot = &mut runtime_error;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window_for_loop.id() => {
                match event {
                    WindowEvent::CloseRequested => input_collector.push_quit(),
                    WindowEvent::Resized(new_size) => {
                        input_collector.push_resize(new_size.width, new_size.height);
                    }
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = window_for_loop.inner_size();
                        input_collector.push_resize(size.width, size.height);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        input_collector.handle_keyboard_input(&event);
                    }
                    WindowEvent::RedrawRequested => {
                        if !simulation.poll_interrupt(&interrupted) {
                            window_target.exit();
                            return;
                        }

                        let now = Instant::now();
                        let frame_dt = frame_clock.tick(now);
                        let report = simulation.step(
                            frame_dt.as_secs_f64(),
                            &mut input_collector.events,
                            &input_collector.action_states,
                        );

                        if let Some(viewport) = report.resized {
                            if let Err(error) = resize_renderer(&mut renderer, viewport) {
                                warn!(error = %error, "renderer_resize_failed");
                                *runtime_error_slot = Some(error);
                                window_target.exit();
                                return;
                            }
                        }

                        if let Err(error) =
                            renderer.render(simulation.world(), simulation.camera())
                        {
                            warn!(error = %error, "renderer_draw_failed");
                            *runtime_error_slot = Some(AppError::Render(error));
                            window_target.exit();
                            return;
                        }

                        frame_stats.record_frame(frame_dt, report.rollbacks);
                        if let Some(snapshot) = frame_stats.maybe_snapshot(now) {
                            info!(
                                fps = snapshot.fps,
                                frame_time_ms = snapshot.frame_time_ms,
                                worst_frame_time_ms = snapshot.worst_frame_time_ms,
                                rollbacks = snapshot.rollbacks,
                                zoom = simulation.camera().zoom(),
                                "frame_stats"
                            );
                        }

                        if !simulation.is_running() {
                            window_target.exit();
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window_for_loop.request_redraw();
            }
            Event::LoopExiting => {
                let reason = simulation.stop_reason().map(|reason| reason.as_str());
                info!(reason, pending_events = input_collector.events.len(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)?;

    match runtime_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn resize_renderer(renderer: &mut Renderer, viewport: Viewport) -> Result<(), AppError> {
    renderer
        .resize(viewport.width, viewport.height)
        .map_err(AppError::ResizeRenderer)
}

/// Reads the map, its tileset images and the hero sprite from the data
/// directory and spawns the hero with its top-left at the map center.
fn load_scene(
    app_paths: &AppPaths,
    config: &LoopConfig,
) -> Result<(SceneWorld, RenderAssets, EntityId), StartupError> {
    let map_path = resolve_asset_path(&app_paths.data_dir, &config.map_file)?;
    let hero_path = resolve_asset_path(&app_paths.data_dir, &config.hero_image)?;

    let map = load_tmx(&map_path).map_err(|source| StartupError::Map {
        path: map_path.clone(),
        source,
    })?;
    let (map_width, map_height) = (map.tilemap.width(), map.tilemap.height());
    info!(
        map = %map_path.display(),
        width = map_width,
        height = map_height,
        layers = map.tilemap.layers().len(),
        tilesets = map.tilemap.tilesets().len(),
        obstacles = map.obstacles.len(),
        "map_loaded"
    );

    let mut tileset_images = Vec::with_capacity(map.tilemap.tilesets().len());
    for tileset in map.tilemap.tilesets() {
        let image = load_image_rgba(&tileset.image).map_err(|source| StartupError::Asset {
            path: tileset.image.clone(),
            source,
        })?;
        tileset_images.push(image);
    }

    let hero = load_image_rgba(&hero_path).map_err(|source| StartupError::Asset {
        path: hero_path.clone(),
        source,
    })?;
    let hero_size = Vec2::new(hero.width as f64, hero.height as f64);
    let spawn = map.tilemap.pixel_rect().center();

    let mut world = SceneWorld::new(Some(map.tilemap), CollisionWorld::new(map.obstacles));
    let player = world.spawn(spawn, hero_size, Some(SpriteId(0)));
    let assets = RenderAssets {
        tileset_images,
        sprites: vec![hero],
    };
    Ok((world, assets, player))
}

fn resolve_asset_path(data_dir: &Path, name: &str) -> Result<std::path::PathBuf, StartupError> {
    validate_asset_name(name).map_err(|source| StartupError::InvalidAssetName {
        name: name.to_string(),
        source,
    })?;
    Ok(data_dir.join(name))
}

/// Wall-clock frame delta. No clamping: a long stall produces one long step.
#[derive(Debug)]
struct FrameClock {
    last_frame: Instant,
}

impl FrameClock {
    fn new(now: Instant) -> Self {
        Self { last_frame: now }
    }

    fn tick(&mut self, now: Instant) -> Duration {
        let frame_dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        frame_dt
    }
}

/// Turns winit window events into the per-frame event queue plus held-key
/// state consumed by `Simulation::step`.
#[derive(Debug, Default)]
struct InputCollector {
    events: VecDeque<FrameEvent>,
    action_states: ActionStates,
    zoom_in_key_is_down: bool,
    zoom_out_key_is_down: bool,
}

impl InputCollector {
    fn push_quit(&mut self) {
        self.events.push_back(FrameEvent::Quit);
    }

    fn push_resize(&mut self, width: u32, height: u32) {
        self.events.push_back(FrameEvent::Resized { width, height });
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        self.handle_physical_key(key_event.physical_key, key_event.state);
    }

    fn handle_physical_key(&mut self, key: PhysicalKey, state: ElementState) {
        let is_pressed = state == ElementState::Pressed;
        if let Some(action) = movement_action(key) {
            self.action_states.set(action, is_pressed);
        }

        if is_zoom_in_key(key) {
            if is_pressed && !self.zoom_in_key_is_down {
                self.events.push_back(FrameEvent::KeyDown(Key::ZoomIn));
            }
            self.zoom_in_key_is_down = is_pressed;
            return;
        }
        if is_zoom_out_key(key) {
            if is_pressed && !self.zoom_out_key_is_down {
                self.events.push_back(FrameEvent::KeyDown(Key::ZoomOut));
            }
            self.zoom_out_key_is_down = is_pressed;
            return;
        }
        if !is_pressed {
            return;
        }
        let key = match key {
            PhysicalKey::Code(KeyCode::Escape) => Key::Escape,
            _ => Key::Other,
        };
        self.events.push_back(FrameEvent::KeyDown(key));
    }
}

fn movement_action(key: PhysicalKey) -> Option<InputAction> {
    match key {
        PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
            Some(InputAction::MoveUp)
        }
        PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
            Some(InputAction::MoveDown)
        }
        PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
            Some(InputAction::MoveLeft)
        }
        PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
            Some(InputAction::MoveRight)
        }
        _ => None,
    }
}

fn is_zoom_in_key(key: PhysicalKey) -> bool {
    matches!(
        key,
        PhysicalKey::Code(KeyCode::Equal) | PhysicalKey::Code(KeyCode::NumpadAdd)
    )
}

fn is_zoom_out_key(key: PhysicalKey) -> bool {
    matches!(
        key,
        PhysicalKey::Code(KeyCode::Minus) | PhysicalKey::Code(KeyCode::NumpadSubtract)
    )
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
