use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::{Camera, Rect, SceneWorld, SourceRect, TileMap, Vec2, Viewport};
use crate::content::LoadedImage;

const CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const MISSING_TILE_COLOR: [u8; 4] = [255, 0, 255, 255];

/// Decoded images the renderer draws from. `tileset_images[i]` belongs to
/// `TileMap::tilesets()[i]`; entity sprites are looked up by `SpriteId`.
#[derive(Debug, Default)]
pub struct RenderAssets {
    pub tileset_images: Vec<LoadedImage>,
    pub sprites: Vec<LoadedImage>,
}

/// Screen rectangle in pixels; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScreenRectPx {
    pub(crate) left: i32,
    pub(crate) top: i32,
    pub(crate) right: i32,
    pub(crate) bottom: i32,
}

impl ScreenRectPx {
    fn width(&self) -> i32 {
        self.right - self.left
    }

    fn height(&self) -> i32 {
        self.bottom - self.top
    }

    fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    assets: RenderAssets,
}

impl Renderer {
    pub fn new(window: Arc<Window>, assets: RenderAssets) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            assets,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Draws visible tile layers bottom to top, then entities, then presents.
    pub fn render(&mut self, world: &SceneWorld, camera: &Camera) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }
        let (width, height) = (self.viewport.width, self.viewport.height);
        let frame = self.pixels.frame_mut();
        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&CLEAR_COLOR);
        }

        if let Some(tilemap) = world.tilemap() {
            draw_tile_layers(
                frame,
                width,
                height,
                tilemap,
                camera,
                &self.assets.tileset_images,
            );
        }

        for entity in world.entities() {
            let dst = screen_rect_for_world_rect(camera, &entity.body_rect());
            let sprite = entity
                .sprite()
                .and_then(|id| self.assets.sprites.get(id.0));
            match sprite {
                Some(image) => blit_scaled(frame, width, height, image, full_source(image), dst),
                None => fill_rect(frame, width, height, dst, PLACEHOLDER_COLOR),
            }
        }

        self.pixels.render()
    }
}

fn draw_tile_layers(
    frame: &mut [u8],
    width: u32,
    height: u32,
    tilemap: &TileMap,
    camera: &Camera,
    tileset_images: &[LoadedImage],
) {
    let bounds = tile_culling_bounds(tilemap, camera.visible_world_rect());
    let Some(range) = tilemap.visible_tile_range(&bounds) else {
        return;
    };

    for (layer_index, layer) in tilemap.layers().iter().enumerate() {
        if !layer.visible {
            continue;
        }
        for y in range.y_min..=range.y_max {
            for x in range.x_min..=range.x_max {
                let Some(gid) = tilemap.gid_at(layer_index, x, y) else {
                    continue;
                };
                let Some((tileset_index, local_id)) = tilemap.resolve_gid(gid) else {
                    continue;
                };
                let tileset = &tilemap.tilesets()[tileset_index];
                let world_rect = tile_draw_rect(tilemap, x, y, tileset.tile_width, tileset.tile_height);
                let dst = screen_rect_for_world_rect(camera, &world_rect);
                match (
                    tileset_images.get(tileset_index),
                    tileset.source_rect(local_id),
                ) {
                    (Some(image), Some(src)) => blit_scaled(frame, width, height, image, src, dst),
                    _ => fill_rect(frame, width, height, dst, MISSING_TILE_COLOR),
                }
            }
        }
    }
}

/// Tiles from a tileset whose tiles are larger than the map grid are anchored
/// to the bottom-left of their cell.
fn tile_draw_rect(tilemap: &TileMap, x: u32, y: u32, tile_width: u32, tile_height: u32) -> Rect {
    let cell = tilemap.tile_world_rect(x, y);
    Rect::new(
        cell.x,
        cell.bottom() - tile_height as f64,
        tile_width as f64,
        tile_height as f64,
    )
}

/// Widens the view so cells whose oversized tiles reach into it from below or
/// from the left are not culled.
fn tile_culling_bounds(tilemap: &TileMap, view: Rect) -> Rect {
    let (grid_width, grid_height) = tilemap.tile_size();
    let (max_width, max_height) = tilemap
        .tilesets()
        .iter()
        .fold((grid_width, grid_height), |(w, h), tileset| {
            (w.max(tileset.tile_width), h.max(tileset.tile_height))
        });
    let extra_width = (max_width - grid_width) as f64;
    let extra_height = (max_height - grid_height) as f64;
    Rect::new(
        view.x - extra_width,
        view.y,
        view.width + extra_width,
        view.height + extra_height,
    )
}

/// Both corners are rounded independently so neighbouring tiles share edges
/// at any zoom.
pub(crate) fn screen_rect_for_world_rect(camera: &Camera, rect: &Rect) -> ScreenRectPx {
    let (left, top) = round_px(camera.world_to_screen(rect.topleft()));
    let (right, bottom) = round_px(camera.world_to_screen(rect.topleft() + rect.size()));
    ScreenRectPx {
        left,
        top,
        right,
        bottom,
    }
}

fn round_px(point: Vec2) -> (i32, i32) {
    (point.x.round() as i32, point.y.round() as i32)
}

fn full_source(image: &LoadedImage) -> SourceRect {
    SourceRect {
        x: 0,
        y: 0,
        width: image.width,
        height: image.height,
    }
}

fn clip_to_frame(dst: ScreenRectPx, width: u32, height: u32) -> Option<ScreenRectPx> {
    let clipped = ScreenRectPx {
        left: dst.left.max(0),
        top: dst.top.max(0),
        right: dst.right.min(width as i32),
        bottom: dst.bottom.min(height as i32),
    };
    (!clipped.is_empty()).then_some(clipped)
}

pub(crate) fn fill_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    dst: ScreenRectPx,
    color: [u8; 4],
) {
    let Some(clipped) = clip_to_frame(dst, width, height) else {
        return;
    };
    let frame_width = width as usize;
    for y in clipped.top..clipped.bottom {
        let row = y as usize * frame_width;
        for x in clipped.left..clipped.right {
            let offset = (row + x as usize) * 4;
            if let Some(pixel) = frame.get_mut(offset..offset + 4) {
                pixel.copy_from_slice(&color);
            }
        }
    }
}

/// Nearest-neighbour copy of `src` into `dst`. Fully transparent source pixels
/// are skipped, everything else overwrites the frame.
pub(crate) fn blit_scaled(
    frame: &mut [u8],
    width: u32,
    height: u32,
    image: &LoadedImage,
    src: SourceRect,
    dst: ScreenRectPx,
) {
    if src.width == 0 || src.height == 0 || dst.is_empty() {
        return;
    }
    if src.x.saturating_add(src.width) > image.width
        || src.y.saturating_add(src.height) > image.height
        || image.rgba.len() < image.width as usize * image.height as usize * 4
    {
        return;
    }
    let Some(clipped) = clip_to_frame(dst, width, height) else {
        return;
    };

    let dst_w = dst.width() as i64;
    let dst_h = dst.height() as i64;
    let frame_width = width as usize;
    let image_width = image.width as usize;

    for out_y in clipped.top..clipped.bottom {
        let dy = (out_y - dst.top) as i64;
        let src_y = (dy * src.height as i64 / dst_h).min(src.height as i64 - 1) as usize;
        let src_row = (src.y as usize + src_y) * image_width;
        let dst_row = out_y as usize * frame_width;

        for out_x in clipped.left..clipped.right {
            let dx = (out_x - dst.left) as i64;
            let src_x = (dx * src.width as i64 / dst_w).min(src.width as i64 - 1) as usize;
            let src_offset = (src_row + src.x as usize + src_x) * 4;
            let alpha = image.rgba[src_offset + 3];
            if alpha == 0 {
                continue;
            }
            let dst_offset = (dst_row + out_x as usize) * 4;
            frame[dst_offset..dst_offset + 4]
                .copy_from_slice(&image.rgba[src_offset..src_offset + 4]);
        }
    }
}
