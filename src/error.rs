//! Error types for the coupled GAN training library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration, fatal at construction time
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A recognized option combination that is deliberately unsupported
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A generator update produced a non-finite loss more times than allowed
    #[error("generator update produced non-finite loss {retries} times in a row")]
    NumericInstability { retries: usize },

    /// Checkpoint, label-index or image read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Torch backend error
    #[error("torch error: {0}")]
    Tch(#[from] tch::TchError),

    /// Image encoding/decoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Configuration errors are never recovered
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NumericInstability { .. })
    }
}
