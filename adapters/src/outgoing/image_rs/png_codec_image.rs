use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, ImageReader, Rgba};
use tracing::trace;

use domain::palette::{Palette, PaletteImage};
use pixel_hawk_application::error::{AppError, AppResult};
use pixel_hawk_application::ports::outgoing::palette_codec::PaletteCodecPort;

/// PNG round-trips against the fixed palette. Any decoded pixel must be
/// either fully transparent or an exact palette color.
#[derive(Clone, Copy, Default)]
pub struct PalettePngCodec;

impl PalettePngCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn decode_impl(&self, bytes: &[u8]) -> AppResult<PaletteImage> {
        let reader = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png);
        let decoded = reader.decode().map_err(|e| AppError::Codec {
            message: format!("Failed to decode PNG: {e}"),
        })?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let palette = Palette::global();

        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            pixels.push(palette.index_for_rgba(r, g, b, a)?);
        }

        trace!("decoded {width}x{height} PNG ({} bytes)", bytes.len());
        Ok(PaletteImage::from_pixels(width, height, pixels)?)
    }

    fn encode_impl(&self, image: &PaletteImage) -> AppResult<Vec<u8>> {
        let palette = Palette::global();
        let mut rgba_bytes = Vec::with_capacity(image.pixels().len() * 4);
        for &index in image.pixels() {
            let (r, g, b, a) = palette.rgba_of(index);
            rgba_bytes.extend_from_slice(&[r, g, b, a]);
        }

        let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
            image.width(),
            image.height(),
            rgba_bytes,
        )
        .ok_or_else(|| AppError::Codec {
            message: "Pixel buffer does not match the image dimensions".to_string(),
        })?;

        let mut png_bytes = Vec::new();
        buffer
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|e| AppError::Codec {
                message: format!("Failed to encode PNG: {e}"),
            })?;

        if png_bytes.is_empty() {
            return Err(AppError::Codec {
                message: "PNG encoding produced empty output".to_string(),
            });
        }
        Ok(png_bytes)
    }
}

impl PaletteCodecPort for PalettePngCodec {
    fn decode_png(&self, bytes: &[u8]) -> AppResult<PaletteImage> {
        self.decode_impl(bytes)
    }

    fn encode_png(&self, image: &PaletteImage) -> AppResult<Vec<u8>> {
        self.encode_impl(image)
    }
}
