//! Output writers: GDAL-backed grid files (GeoTIFF / netCDF) and the
//! metadata embedded in them.
pub mod grid;
pub mod metadata;

pub use grid::{NO_DATA_VALUE, OutputDriver, write_grid, write_grids};
pub use metadata::{embed_grid_metadata, provenance_fields};
