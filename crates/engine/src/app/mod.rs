mod camera;
mod collision;
mod entity;
mod geometry;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod simulation;
mod tilemap;
mod world;

pub use camera::{
    world_to_screen_px, Camera, CameraError, Viewport, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_STEP,
};
pub use collision::CollisionWorld;
pub use entity::{Entity, EntityId, SpriteId, FEET_HEIGHT, FEET_WIDTH_RATIO};
pub use geometry::{Rect, Vec2};
pub use input::{ActionStates, FrameEvent, InputAction, Key};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::FrameStatsSnapshot;
pub use rendering::{RenderAssets, Renderer};
pub use simulation::{
    FrameReport, LoopState, Simulation, SimulationSettings, StopReason, DEFAULT_MOVE_SPEED,
};
pub use tilemap::{
    strip_gid_flags, SourceRect, TileLayer, TileMap, TileRange, TilemapError, Tileset,
    GID_FLAG_MASK,
};
pub use world::SceneWorld;
