use thiserror::Error;

use super::entity::EntityId;
use super::geometry::{Rect, Vec2};

pub const CAMERA_ZOOM_DEFAULT: f64 = 1.0;
pub const CAMERA_ZOOM_STEP: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f64 * 0.5, self.height as f64 * 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CameraError {
    #[error("zoom must be a positive finite number, got {zoom}")]
    InvalidZoom { zoom: f64 },
}

/// Maps world coordinates to screen pixels. `offset` is the world point drawn
/// at the top-left screen pixel; zoom scales world units to pixels.
#[derive(Debug, Clone)]
pub struct Camera {
    viewport: Viewport,
    zoom: f64,
    offset: Vec2,
    tracked: Option<EntityId>,
}

impl Camera {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Viewport::new(viewport.width, viewport.height),
            zoom: CAMERA_ZOOM_DEFAULT,
            offset: Vec2::ZERO,
            tracked: None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn tracked(&self) -> Option<EntityId> {
        self.tracked
    }

    pub fn track(&mut self, entity: EntityId) {
        self.tracked = Some(entity);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), CameraError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(CameraError::InvalidZoom { zoom });
        }
        self.zoom = zoom;
        Ok(())
    }

    /// Moves zoom by `steps` increments of `step`. Returns false and leaves the
    /// zoom untouched when the result would not be positive.
    pub fn adjust_zoom(&mut self, steps: i32, step: f64) -> bool {
        if steps == 0 {
            return false;
        }
        self.set_zoom(self.zoom + steps as f64 * step).is_ok()
    }

    pub fn center_on(&mut self, point: Vec2) {
        let half_view_world = self.viewport.center() * self.zoom.recip();
        self.offset = point - half_view_world;
    }

    pub fn world_to_screen(&self, point: Vec2) -> Vec2 {
        (point - self.offset) * self.zoom
    }

    pub fn screen_to_world(&self, point: Vec2) -> Vec2 {
        point * self.zoom.recip() + self.offset
    }

    pub fn visible_world_rect(&self) -> Rect {
        Rect::new(
            self.offset.x,
            self.offset.y,
            self.viewport.width as f64 / self.zoom,
            self.viewport.height as f64 / self.zoom,
        )
    }
}

pub fn world_to_screen_px(camera: &Camera, point: Vec2) -> (i32, i32) {
    let screen = camera.world_to_screen(point);
    (screen.x.round() as i32, screen.y.round() as i32)
}
