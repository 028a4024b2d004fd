use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid tile coordinates: {0}")]
    InvalidTileCoordinates(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid pixel coordinates: {0}")]
    InvalidPixelCoordinates(String),

    #[error("Invalid rectangle: {0}")]
    InvalidRectangle(String),

    #[error("Palette violation: {0}")]
    PaletteViolation(String),

    #[error("Codec error: {0}")]
    CodecError(String),

    #[error("Invalid {kind} value: {value}")]
    InvalidEnumValue { kind: &'static str, value: i64 },
}

pub type DomainResult<T> = Result<T, DomainError>;
