use std::collections::BTreeMap;
use std::path::Path;

use gdal::{DriverManager, Metadata};
use gdal::raster::Buffer;
use tracing::{debug, info};

use crate::io::gdal::GridError;
use crate::io::grid::Grid;
use crate::io::writers::metadata::{embed_band_metadata, embed_grid_metadata};

/// Value written for masked cells
pub const NO_DATA_VALUE: f64 = -9999.0;

/// GDAL driver used for an output path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDriver {
    GTiff,
    NetCdf,
}

impl OutputDriver {
    /// `.nc` selects netCDF; everything else is written as GeoTIFF
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "nc" | "nc4" => OutputDriver::NetCdf,
            _ => OutputDriver::GTiff,
        }
    }

    pub fn gdal_name(self) -> &'static str {
        match self {
            OutputDriver::GTiff => "GTiff",
            OutputDriver::NetCdf => "netCDF",
        }
    }
}

/// Write one grid, keeping its own georeferencing and metadata
pub fn write_grid(output: &Path, grid: &Grid) -> Result<(), GridError> {
    write_grids(
        output,
        std::slice::from_ref(grid),
        grid.geotransform,
        &grid.projection,
        &grid.metadata,
    )
}

/// Write `bands` as a multi-band f64 raster.
///
/// The raster is created under a temporary name in the destination
/// directory and renamed over `output` once GDAL has closed it.
pub fn write_grids(
    output: &Path,
    bands: &[Grid],
    geotransform: [f64; 6],
    projection: &str,
    metadata: &BTreeMap<String, String>,
) -> Result<(), GridError> {
    let first = bands
        .first()
        .ok_or_else(|| GridError::UnsupportedFormat("no bands to write".to_string()))?;
    let (rows, cols) = first.shape();
    for band in bands {
        if !band.same_shape(first) {
            let (r, c) = band.shape();
            return Err(GridError::DimensionMismatch(cols, rows, c, r));
        }
    }

    let driver_kind = OutputDriver::for_path(output);
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let suffix = output
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let tmp_path = tempfile::Builder::new()
        .prefix(".improver-")
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path();

    {
        let driver = DriverManager::get_driver_by_name(driver_kind.gdal_name())?;
        let mut ds = driver.create_with_band_type::<f64, _>(&tmp_path, cols, rows, bands.len())?;
        embed_grid_metadata(&mut ds, geotransform, projection, metadata)?;

        for (idx, grid) in bands.iter().enumerate() {
            let values: Vec<f64> = grid
                .data
                .iter()
                .zip(grid.mask.iter())
                .map(|(&v, &masked)| if masked { NO_DATA_VALUE } else { v })
                .collect();
            let mut band = ds.rasterband(idx + 1)?;
            band.set_no_data_value(Some(NO_DATA_VALUE))?;
            if !grid.name.is_empty() {
                band.set_description(&grid.name)?;
            }
            let items = embed_band_metadata(&mut band, &grid.metadata, metadata)?;
            debug!("Band {}: {} metadata item(s)", idx + 1, items);
            let mut buf = Buffer::new((cols, rows), values);
            band.write((0, 0), (cols, rows), &mut buf)?;
        }
        // Dataset is flushed and closed here
    }

    tmp_path.persist(output).map_err(|e| GridError::Io(e.error))?;
    info!(
        "Wrote {} band(s) of {}x{} to {:?} ({})",
        bands.len(),
        cols,
        rows,
        output,
        driver_kind.gdal_name()
    );
    Ok(())
}
