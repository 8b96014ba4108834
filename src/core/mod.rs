//! Core processing building blocks: solar geometry and the day/night mask,
//! spatial subsetting, metadata interpretation, wind downscaling inputs,
//! cycletime handling and typed parameters. These are internal primitives
//! consumed by the high-level `api` module.
pub mod downscaling;
pub mod metadata;
pub mod params;
pub mod solar;
pub mod subset;
pub mod temporal;
