//! I/O layer for gridded fields.
//! Provides the in-memory `grid` type, the GDAL-backed `gdal` reader and
//! coordinate helpers, and `writers` for GeoTIFF/netCDF output.
pub mod grid;
pub use grid::Grid;

pub mod gdal;
pub use gdal::{GridError, GridMetadata, GridReader, grid_lat_lon, is_lat_lon, read_first_grid};

pub mod writers;
