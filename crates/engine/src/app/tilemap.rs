use std::path::PathBuf;

use thiserror::Error;

use super::geometry::{Rect, Vec2};

/// Tiled stores flip/rotation flags in the high bits of every gid.
pub const GID_FLAG_MASK: u32 = 0xF000_0000;

pub fn strip_gid_flags(raw_gid: u32) -> u32 {
    raw_gid & !GID_FLAG_MASK
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub first_gid: u32,
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
    pub columns: u32,
    pub margin: u32,
    pub spacing: u32,
    pub image: PathBuf,
}

/// Pixel rectangle inside a tileset image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tileset {
    pub fn contains_gid(&self, gid: u32) -> bool {
        gid >= self.first_gid && gid - self.first_gid < self.tile_count
    }

    pub fn source_rect(&self, local_id: u32) -> Option<SourceRect> {
        if local_id >= self.tile_count || self.columns == 0 {
            return None;
        }
        let column = local_id % self.columns;
        let row = local_id / self.columns;
        Some(SourceRect {
            x: self.margin + column * (self.tile_width + self.spacing),
            y: self.margin + row * (self.tile_height + self.spacing),
            width: self.tile_width,
            height: self.tile_height,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub visible: bool,
    tiles: Vec<u32>,
}

impl TileLayer {
    pub fn new(name: impl Into<String>, visible: bool, tiles: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            visible,
            tiles,
        }
    }

    pub fn tiles(&self) -> &[u32] {
        &self.tiles
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("layer '{layer}' tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("tile size must be non-zero, got {width}x{height}")]
    ZeroTileSize { width: u32, height: u32 },
}

/// Inclusive tile index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

/// Orthogonal tile map. Tile (0,0) sits at world (0,0); layers are stored
/// bottom to top and hold row-major gids where 0 means empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    layers: Vec<TileLayer>,
    tilesets: Vec<Tileset>,
}

impl TileMap {
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        layers: Vec<TileLayer>,
        mut tilesets: Vec<Tileset>,
    ) -> Result<Self, TilemapError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(TilemapError::ZeroTileSize {
                width: tile_width,
                height: tile_height,
            });
        }
        let expected = width as usize * height as usize;
        for layer in &layers {
            if layer.tiles.len() != expected {
                return Err(TilemapError::TileCountMismatch {
                    layer: layer.name.clone(),
                    expected,
                    actual: layer.tiles.len(),
                });
            }
        }
        tilesets.sort_by_key(|tileset| tileset.first_gid);
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            layers,
            tilesets,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn tilesets(&self) -> &[Tileset] {
        &self.tilesets
    }

    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f64 * self.tile_width as f64,
            self.height as f64 * self.tile_height as f64,
        )
    }

    pub fn pixel_rect(&self) -> Rect {
        Rect::from_topleft(Vec2::ZERO, self.pixel_size())
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn gid_at(&self, layer: usize, x: u32, y: u32) -> Option<u32> {
        let index = self.index_of(x, y)?;
        self.layers.get(layer)?.tiles.get(index).copied()
    }

    pub fn tile_world_rect(&self, x: u32, y: u32) -> Rect {
        Rect::new(
            x as f64 * self.tile_width as f64,
            y as f64 * self.tile_height as f64,
            self.tile_width as f64,
            self.tile_height as f64,
        )
    }

    /// Resolves a gid to `(tileset index, local tile id)`. The owning tileset
    /// is the one with the greatest `first_gid` not above the gid.
    pub fn resolve_gid(&self, raw_gid: u32) -> Option<(usize, u32)> {
        let gid = strip_gid_flags(raw_gid);
        if gid == 0 {
            return None;
        }
        let index = self
            .tilesets
            .iter()
            .rposition(|tileset| tileset.first_gid <= gid)?;
        let tileset = &self.tilesets[index];
        tileset
            .contains_gid(gid)
            .then(|| (index, gid - tileset.first_gid))
    }

    /// Tiles overlapping `bounds`, clamped to the map. `None` when the bounds
    /// miss the map entirely.
    pub fn visible_tile_range(&self, bounds: &Rect) -> Option<TileRange> {
        if self.width == 0 || self.height == 0 || !bounds.has_area() {
            return None;
        }
        let tile_w = self.tile_width as f64;
        let tile_h = self.tile_height as f64;

        let raw_x_min = (bounds.x / tile_w).floor() as i64;
        let raw_x_max = (bounds.right() / tile_w).ceil() as i64 - 1;
        let raw_y_min = (bounds.y / tile_h).floor() as i64;
        let raw_y_max = (bounds.bottom() / tile_h).ceil() as i64 - 1;

        let x_min = raw_x_min.max(0);
        let x_max = raw_x_max.min(self.width as i64 - 1);
        let y_min = raw_y_min.max(0);
        let y_max = raw_y_max.min(self.height as i64 - 1);

        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(TileRange {
            x_min: x_min as u32,
            x_max: x_max as u32,
            y_min: y_min as u32,
            y_max: y_max as u32,
        })
    }
}
