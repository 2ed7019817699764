//! # Error Types
//!
//! Error taxonomy shared by the whole rendering pipeline. Every stage maps its
//! failures onto one of these variants so callers can distinguish "the input
//! file is missing" from "the encoder exited non-zero" without string matching.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while rendering or encoding an animation
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    #[error("Cannot parse '{path}' as NetCDF: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Invalid color mapping configuration: {0}")]
    Config(String),

    #[error("Missing overlay resource: {0}")]
    Resource(PathBuf),

    #[error("Encoder failed with status {status}: {stderr}")]
    Encode { status: i32, stderr: String },

    #[error("Missing frame files for indices {indices:?}")]
    MissingFrames { indices: Vec<usize> },

    #[error("Frame {index} exceeded the per-frame budget of {budget_secs}s")]
    FrameTimeout { index: usize, budget_secs: u64 },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    /// Wraps a `netcdf` error for `path`, distinguishing a missing file from
    /// an unparseable one.
    pub fn from_netcdf(path: &std::path::Path, err: netcdf::Error) -> Self {
        if !path.exists() {
            RenderError::NotFound(path.to_path_buf())
        } else {
            RenderError::Format {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }
}
