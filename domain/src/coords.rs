use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{DomainError, DomainResult};

/// Side length of one canvas tile, in pixels.
pub const TILE_SIZE: u32 = 1000;

/// Highest valid tile coordinate on either axis. Keeps the computed
/// tile id `x * 10000 + y` unambiguous.
pub const MAX_TILE_COORD: u32 = 9_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn validate_bounds(&self) -> DomainResult<()> {
        if self.x > MAX_TILE_COORD || self.y > MAX_TILE_COORD {
            return Err(DomainError::InvalidTileCoordinates(format!(
                "({}, {}) exceeds maximum {MAX_TILE_COORD}",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Computed primary key: `x * 10000 + y`.
    #[must_use]
    pub fn tile_id(&self) -> i64 {
        i64::from(self.x) * 10_000 + i64::from(self.y)
    }

    pub fn from_tile_id(id: i64) -> DomainResult<Self> {
        if id < 0 || id > i64::from(MAX_TILE_COORD) * 10_000 + i64::from(MAX_TILE_COORD) {
            return Err(DomainError::InvalidTileCoordinates(format!(
                "tile id {id} out of range"
            )));
        }
        let x = u32::try_from(id / 10_000).map_err(|_| {
            DomainError::InvalidTileCoordinates(format!("tile id {id} out of range"))
        })?;
        let y = u32::try_from(id % 10_000).map_err(|_| {
            DomainError::InvalidTileCoordinates(format!("tile id {id} out of range"))
        })?;
        Ok(Self { x, y })
    }

    /// Canvas pixel at this tile's top-left corner.
    #[must_use]
    pub fn origin(&self) -> GlobalCoord {
        GlobalCoord::new(self.x * TILE_SIZE, self.y * TILE_SIZE)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.x, self.y)
    }
}

/// Pixel position inside a single tile, in `0..TILE_SIZE` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

impl PixelCoord {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn validate_bounds(&self) -> DomainResult<()> {
        if self.x >= TILE_SIZE || self.y >= TILE_SIZE {
            return Err(DomainError::InvalidPixelCoordinates(format!(
                "Pixel coordinates ({}, {}) exceed tile size {TILE_SIZE}",
                self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Absolute canvas pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalCoord {
    pub x: u32,
    pub y: u32,
}

impl GlobalCoord {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn to_tile_coord(&self) -> TileCoord {
        TileCoord::new(self.x / TILE_SIZE, self.y / TILE_SIZE)
    }

    #[must_use]
    pub fn to_pixel_coord(&self) -> PixelCoord {
        PixelCoord::new(self.x % TILE_SIZE, self.y % TILE_SIZE)
    }

    #[must_use]
    pub fn from_tile_and_pixel(tile: TileCoord, pixel: PixelCoord) -> Self {
        Self::new(tile.x * TILE_SIZE + pixel.x, tile.y * TILE_SIZE + pixel.y)
    }
}

impl fmt::Display for GlobalCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The `(tx, ty, px, py)` 4-tuple used in on-disk file names: a canvas
/// position expressed as a tile plus a pixel offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasPosition {
    pub tile: TileCoord,
    pub pixel: PixelCoord,
}

impl CanvasPosition {
    #[must_use]
    pub fn new(tile: TileCoord, pixel: PixelCoord) -> Self {
        Self { tile, pixel }
    }

    #[must_use]
    pub fn from_global(global: GlobalCoord) -> Self {
        Self {
            tile: global.to_tile_coord(),
            pixel: global.to_pixel_coord(),
        }
    }

    #[must_use]
    pub fn to_global(&self) -> GlobalCoord {
        GlobalCoord::from_tile_and_pixel(self.tile, self.pixel)
    }

    pub fn validate_bounds(&self) -> DomainResult<()> {
        self.tile.validate_bounds()?;
        self.pixel.validate_bounds()
    }
}

impl fmt::Display for CanvasPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.tile.x, self.tile.y, self.pixel.x, self.pixel.y
        )
    }
}

impl FromStr for CanvasPosition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split('_')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| {
                DomainError::InvalidCoordinates(format!(
                    "Expected format 'tx_ty_px_py', got '{s}': {e}"
                ))
            })?;
        let [tx, ty, px, py] = parts.as_slice() else {
            return Err(DomainError::InvalidCoordinates(format!(
                "Expected format 'tx_ty_px_py', got '{s}'"
            )));
        };
        let position = Self::new(TileCoord::new(*tx, *ty), PixelCoord::new(*px, *py));
        position.validate_bounds()?;
        Ok(position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    #[must_use]
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }
}

/// Axis-aligned rectangle in canvas pixel space. Construction validates
/// that the rectangle is non-empty and stays inside the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Overlap between a [`Rect`] and one tile's interior, expressed in both
/// tile-local and rectangle-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileClip {
    pub tile: TileCoord,
    /// Overlap origin within the tile.
    pub tile_x: u32,
    pub tile_y: u32,
    /// Overlap origin within the rectangle.
    pub rect_x: u32,
    pub rect_y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> DomainResult<Self> {
        if w == 0 || h == 0 {
            return Err(DomainError::InvalidRectangle(format!(
                "empty rectangle {w}x{h} at ({x}, {y})"
            )));
        }
        let rect = Self { x, y, w, h };
        let far = GlobalCoord::new(x + w - 1, y + h - 1).to_tile_coord();
        far.validate_bounds().map_err(|_| {
            DomainError::InvalidRectangle(format!(
                "rectangle {w}x{h} at ({x}, {y}) leaves the canvas"
            ))
        })?;
        Ok(rect)
    }

    #[must_use]
    pub fn origin(&self) -> GlobalCoord {
        GlobalCoord::new(self.x, self.y)
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// The rectangle origin as the 4-tuple used in file names.
    #[must_use]
    pub fn position(&self) -> CanvasPosition {
        CanvasPosition::from_global(self.origin())
    }

    pub fn from_position_and_size(position: CanvasPosition, size: Size) -> DomainResult<Self> {
        let origin = position.to_global();
        Self::new(origin.x, origin.y, size.w, size.h)
    }

    /// Every tile this rectangle touches, row-major.
    #[must_use]
    pub fn tiles(&self) -> Vec<TileCoord> {
        let first = self.origin().to_tile_coord();
        let last = GlobalCoord::new(self.x + self.w - 1, self.y + self.h - 1).to_tile_coord();
        let mut tiles = Vec::with_capacity(
            ((last.x - first.x + 1) * (last.y - first.y + 1)) as usize,
        );
        for ty in first.y..=last.y {
            for tx in first.x..=last.x {
                tiles.push(TileCoord::new(tx, ty));
            }
        }
        tiles
    }

    #[must_use]
    pub fn intersects_tile(&self, tile: TileCoord) -> bool {
        self.clip_to_tile(tile).is_some()
    }

    /// Clip this rectangle to one tile's interior. `None` when disjoint.
    #[must_use]
    pub fn clip_to_tile(&self, tile: TileCoord) -> Option<TileClip> {
        let tile_left = tile.x * TILE_SIZE;
        let tile_top = tile.y * TILE_SIZE;
        let left = self.x.max(tile_left);
        let top = self.y.max(tile_top);
        let right = (self.x + self.w).min(tile_left + TILE_SIZE);
        let bottom = (self.y + self.h).min(tile_top + TILE_SIZE);
        if left >= right || top >= bottom {
            return None;
        }
        Some(TileClip {
            tile,
            tile_x: left - tile_left,
            tile_y: top - tile_top,
            rect_x: left - self.x,
            rect_y: top - self.y,
            w: right - left,
            h: bottom - top,
        })
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}
