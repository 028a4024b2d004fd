use crate::error::AppResult;
use domain::palette::PaletteImage;
use std::sync::Arc;

/// PNG round-trips for palette-indexed rasters. Decoding enforces palette
/// conformance; a non-conforming image is a `DomainError::PaletteViolation`.
pub trait PaletteCodecPort: Send + Sync {
    fn decode_png(&self, bytes: &[u8]) -> AppResult<PaletteImage>;

    fn encode_png(&self, image: &PaletteImage) -> AppResult<Vec<u8>>;
}

pub type DynPaletteCodecPort = Arc<dyn PaletteCodecPort>;
