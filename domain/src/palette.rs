use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::coords::Size;
use crate::error::{DomainError, DomainResult};

/// Number of palette entries, including the reserved transparent slot.
pub const PALETTE_LEN: usize = 64;

/// Index 0 is reserved: "no requirement" in a target image, "blank canvas"
/// everywhere else.
pub const TRANSPARENT: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

const fn rgb(value: u32) -> Rgb {
    Rgb {
        r: ((value >> 16) & 0xFF) as u8,
        g: ((value >> 8) & 0xFF) as u8,
        b: (value & 0xFF) as u8,
    }
}

/// The fixed system palette. Entry 0 is the transparent sentinel and holds
/// no color; entries 1..64 are the paintable colors.
const COLORS: [Rgb; PALETTE_LEN] = [
    rgb(0x000000), // 0: transparent sentinel, never matched by color
    rgb(0x000000),
    rgb(0x3C3C3C),
    rgb(0x787878),
    rgb(0xAAAAAA),
    rgb(0xD2D2D2),
    rgb(0xFFFFFF),
    rgb(0x600018),
    rgb(0xA50E1E),
    rgb(0xED1C24),
    rgb(0xFA8072),
    rgb(0xE45C1A),
    rgb(0xFF7F27),
    rgb(0xF6AA09),
    rgb(0xF9DD3B),
    rgb(0xFFFABC),
    rgb(0x9C8431),
    rgb(0xC5AD31),
    rgb(0xE8D45F),
    rgb(0x4A6B3A),
    rgb(0x5A944A),
    rgb(0x84C573),
    rgb(0x0EB968),
    rgb(0x13E67B),
    rgb(0x87FF5E),
    rgb(0x0C816E),
    rgb(0x10AEA6),
    rgb(0x13E1BE),
    rgb(0x0F799F),
    rgb(0x60F7F2),
    rgb(0xBBFAF2),
    rgb(0x28509E),
    rgb(0x4093E4),
    rgb(0x7DC7FF),
    rgb(0x4D31B8),
    rgb(0x6B50F6),
    rgb(0x99B1FB),
    rgb(0x4A4284),
    rgb(0x7A71C4),
    rgb(0xB5AEF1),
    rgb(0x780C99),
    rgb(0xAA38B9),
    rgb(0xE09FF9),
    rgb(0xCB007A),
    rgb(0xEC1F80),
    rgb(0xF38DA9),
    rgb(0x9B1C4D),
    rgb(0xD23D6F),
    rgb(0xFA9EB4),
    rgb(0x684634),
    rgb(0x95682A),
    rgb(0xDBA463),
    rgb(0x7B6352),
    rgb(0x9C846B),
    rgb(0xD6B594),
    rgb(0xD18051),
    rgb(0xF8B277),
    rgb(0xFFC5A5),
    rgb(0x6D643F),
    rgb(0x948C6B),
    rgb(0xCDC59E),
    rgb(0x333941),
    rgb(0x6D758D),
    rgb(0xB3B9D1),
];

/// The fixed, process-wide indexed palette.
pub struct Palette {
    lookup: HashMap<Rgb, u8>,
}

impl Palette {
    fn new() -> Self {
        let mut lookup = HashMap::with_capacity(PALETTE_LEN - 1);
        for (index, color) in COLORS.iter().enumerate().skip(1) {
            lookup.entry(*color).or_insert(index as u8);
        }
        Self { lookup }
    }

    /// The shared immutable instance.
    #[must_use]
    pub fn global() -> &'static Palette {
        static PALETTE: OnceLock<Palette> = OnceLock::new();
        PALETTE.get_or_init(Palette::new)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        PALETTE_LEN
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Color of a paintable entry. `None` for the transparent slot and for
    /// out-of-range indices.
    #[must_use]
    pub fn color(&self, index: u8) -> Option<Rgb> {
        if index == TRANSPARENT {
            return None;
        }
        COLORS.get(usize::from(index)).copied()
    }

    #[must_use]
    pub fn index_of(&self, color: Rgb) -> Option<u8> {
        self.lookup.get(&color).copied()
    }

    /// Map one decoded RGBA pixel to its palette index. Fully transparent
    /// pixels map to index 0; everything else must be opaque and match a
    /// palette color exactly.
    pub fn index_for_rgba(&self, r: u8, g: u8, b: u8, a: u8) -> DomainResult<u8> {
        if a == 0 {
            return Ok(TRANSPARENT);
        }
        if a != u8::MAX {
            return Err(DomainError::PaletteViolation(format!(
                "semi-transparent pixel rgba({r}, {g}, {b}, {a})"
            )));
        }
        self.index_of(Rgb::new(r, g, b))
            .ok_or_else(|| {
                DomainError::PaletteViolation(format!("unknown color rgb({r}, {g}, {b})"))
            })
    }

    /// Expand a palette index back to RGBA; the transparent slot becomes a
    /// fully transparent pixel.
    #[must_use]
    pub fn rgba_of(&self, index: u8) -> (u8, u8, u8, u8) {
        match self.color(index) {
            Some(color) => (color.r, color.g, color.b, u8::MAX),
            None => (0, 0, 0, 0),
        }
    }
}

/// An indexed raster over the fixed palette; one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PaletteImage {
    /// A fully transparent image.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> DomainResult<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(DomainError::CodecError(format!(
                "Expected {expected} pixels, got {}",
                pixels.len()
            )));
        }
        if let Some(&bad) = pixels.iter().find(|&&p| usize::from(p) >= PALETTE_LEN) {
            return Err(DomainError::PaletteViolation(format!(
                "index {bad} outside the palette"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at `(x, y)`; out-of-bounds reads as transparent.
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return TRANSPARENT;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.pixels.get(index).copied().unwrap_or(TRANSPARENT)
    }

    pub fn put(&mut self, x: u32, y: u32, value: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y as usize * self.width as usize + x as usize;
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = value;
        }
    }

    /// Copy a `w`x`h` block from `src` at `(src_x, src_y)` to `(dst_x, dst_y)`
    /// in this image. The block is clamped to both images.
    pub fn paste(
        &mut self,
        src: &PaletteImage,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        w: u32,
        h: u32,
    ) {
        let w = w
            .min(src.width.saturating_sub(src_x))
            .min(self.width.saturating_sub(dst_x));
        let h = h
            .min(src.height.saturating_sub(src_y))
            .min(self.height.saturating_sub(dst_y));
        for row in 0..h {
            let src_start = (src_y + row) as usize * src.width as usize + src_x as usize;
            let dst_start = (dst_y + row) as usize * self.width as usize + dst_x as usize;
            let (Some(src_row), Some(dst_row)) = (
                src.pixels.get(src_start..src_start + w as usize),
                self.pixels.get_mut(dst_start..dst_start + w as usize),
            ) else {
                continue;
            };
            dst_row.copy_from_slice(src_row);
        }
    }
}
