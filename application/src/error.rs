use std::io;
use thiserror::Error;

use domain::error::DomainError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Codec error: {message}")]
    Codec { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{count} consecutive cycle failures")]
    ConsecutiveFailures { count: u32 },
}

pub type AppResult<T> = Result<T, AppError>;
