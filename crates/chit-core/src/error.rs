//! Error types for Chit

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("OCR service error: {0}")]
    OcrService(String),

    #[error("Image unreadable: {0}")]
    UnreadableImage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
