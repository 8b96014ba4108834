//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts the per-layer errors (grid I/O, solar geometry, verification,
//! subsetting, metadata, downscaling) and adds semantic variants for argument
//! validation and unavailable processing steps.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Grid(#[from] crate::io::GridError),

    #[error("{0}")]
    Solar(#[from] crate::core::solar::SolarError),

    #[error("{0}")]
    Verify(#[from] crate::verify::VerifyError),

    #[error("{0}")]
    Subset(#[from] crate::core::subset::SubsetError),

    #[error("{0}")]
    Metadata(#[from] crate::core::metadata::MetadataError),

    #[error("{0}")]
    Downscaling(#[from] crate::core::downscaling::DownscalingError),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Missing required metadata: {0}")]
    MissingMetadata(String),

    #[error("{0} is not available in this implementation")]
    Unsupported(String),
}
