use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::io::grid::{Grid, IDENTITY_GEOTRANSFORM};

/// Errors encountered when reading, converting or writing grids
#[derive(Debug, Error)]
pub enum GridError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Cannot convert units from '{from}' to '{to}'")]
    Units { from: String, to: String },
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GridMetadata {
    /// Width (columns) of the raster
    pub size_x: usize,
    /// Height (rows) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    pub geotransform: [f64; 6],
    /// Projection in WKT format, or `EPSG:n` when an authority code is present
    pub projection: String,
    /// Dataset-level metadata key-value pairs (domain "")
    pub metadata: BTreeMap<String, String>,
}

/// Reader for gridded fields in any GDAL raster format (GeoTIFF, NetCDF, ...)
pub struct GridReader {
    pub path: PathBuf,
    pub dataset: Dataset,
    pub metadata: GridMetadata,
}

// Helper to extract EPSG code from WKT authority tag
fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

fn collect_metadata<M: Metadata>(item: &M) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(entries) = item.metadata_domain("") {
        for entry in entries {
            if let Some((key, val)) = entry.split_once('=') {
                map.insert(key.to_string(), val.to_string());
            }
        }
    }
    map
}

impl GridReader {
    /// Open a GDAL-supported dataset
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GridError> {
        let path = path.as_ref();
        let dataset = Dataset::open(path)?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GridError::UnsupportedFormat(format!(
                "No raster bands found in {}",
                path.display()
            )));
        }
        let geotransform = dataset.geo_transform().unwrap_or(IDENTITY_GEOTRANSFORM);
        let proj = dataset.projection();
        let projection = if proj.starts_with("EPSG:") {
            proj
        } else if let Some(code) = parse_epsg(&proj) {
            code
        } else {
            proj
        };
        let metadata = collect_metadata(&dataset);
        debug!(
            "Opened {:?}: {}x{} with {} band(s), projection '{}'",
            path, size_x, size_y, bands, projection
        );
        Ok(GridReader {
            path: path.to_path_buf(),
            dataset,
            metadata: GridMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                metadata,
            },
        })
    }

    /// Open a file for its main field. A netCDF file holding several
    /// gridded variables is opened at its first subdataset that is not a
    /// bounds variable.
    pub fn open_field<P: AsRef<Path>>(path: P) -> Result<Self, GridError> {
        let path = path.as_ref();
        let dataset = Dataset::open(path)?;
        if dataset.raster_count() > 0 {
            return Self::open(path);
        }
        let subdatasets = dataset.metadata_domain("SUBDATASETS").unwrap_or_default();
        let name = subdatasets
            .iter()
            .filter_map(|entry| entry.split_once('='))
            .filter(|(key, _)| key.ends_with("_NAME"))
            .map(|(_, value)| value)
            .find(|value| !is_bounds_variable(value))
            .ok_or_else(|| {
                GridError::UnsupportedFormat(format!("No gridded field found in {}", path.display()))
            })?;
        debug!("Opening subdataset {}", name);
        Self::open(name)
    }

    /// Metadata items of one band (1-based index), without the dataset items
    pub fn band_metadata(&self, index: usize) -> Result<BTreeMap<String, String>, GridError> {
        Ok(collect_metadata(&self.dataset.rasterband(index)?))
    }

    /// Look a key up in the dataset metadata.
    ///
    /// NetCDF globals are exposed by GDAL with a `NC_GLOBAL#` prefix and
    /// extra dimensions as `NETCDF_DIM_<name>` on the first band.
    pub fn metadata_value(&self, key: &str) -> Option<String> {
        let meta = &self.metadata.metadata;
        if let Some(v) = meta.get(key) {
            return Some(v.clone());
        }
        if let Some(v) = meta.get(&format!("NC_GLOBAL#{}", key)) {
            return Some(v.clone());
        }
        let band = self.dataset.rasterband(1).ok()?;
        band.metadata_item(&format!("NETCDF_DIM_{}", key), "")
    }

    /// Read a single band (1-based index) as a grid of shape (rows, cols)
    pub fn read_grid(&self, index: usize) -> Result<Grid, GridError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GridError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, None)?;
        let data_vec = buf.data().to_vec();
        let data = Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec)
            .map_err(|_| {
                GridError::DimensionMismatch(
                    self.metadata.size_x,
                    self.metadata.size_y,
                    self.metadata.size_x,
                    self.metadata.size_y,
                )
            })?;

        let no_data = band.no_data_value();
        let mask = data.mapv(|v| v.is_nan() || no_data.is_some_and(|nd| v == nd));

        let band_meta = collect_metadata(&band);
        let mut units = band.unit();
        if units.is_empty() {
            units = band_meta
                .get("units")
                .or_else(|| self.metadata.metadata.get("units"))
                .cloned()
                .unwrap_or_default();
        }
        let name = band_meta
            .get("standard_name")
            .or_else(|| band_meta.get("long_name"))
            .cloned()
            .unwrap_or_else(|| {
                self.path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        let mut metadata = self.metadata.metadata.clone();
        metadata.extend(band_meta);

        Ok(Grid {
            data,
            mask,
            geotransform: self.metadata.geotransform,
            projection: self.metadata.projection.clone(),
            units,
            name,
            metadata,
        })
    }

    /// Read every band in order
    pub fn read_all(&self) -> Result<Vec<Grid>, GridError> {
        let mut result = Vec::with_capacity(self.metadata.bands);
        for idx in 1..=self.metadata.bands {
            result.push(self.read_grid(idx)?);
        }
        Ok(result)
    }
}

// Subdataset names look like `NETCDF:"file.nc":time_bnds`
fn is_bounds_variable(subdataset: &str) -> bool {
    let var = subdataset.rsplit(':').next().unwrap_or(subdataset);
    var.ends_with("_bnds") || var.ends_with("_bounds")
}

/// Open `path` and read its first band
pub fn read_first_grid<P: AsRef<Path>>(path: P) -> Result<Grid, GridError> {
    GridReader::open(path)?.read_grid(1)
}

pub(crate) fn spatial_ref_from(projection: &str) -> Result<SpatialRef, GridError> {
    if projection.trim().is_empty() {
        return Err(GridError::UnsupportedFormat(
            "grid has no coordinate reference system".to_string(),
        ));
    }
    if let Some(code) = projection.strip_prefix("EPSG:") {
        let code: u32 = code
            .trim()
            .parse()
            .map_err(|_| GridError::UnsupportedFormat(format!("bad EPSG code: {}", projection)))?;
        return Ok(SpatialRef::from_epsg(code)?);
    }
    Ok(SpatialRef::from_wkt(projection)?)
}

/// True when the grid's coordinates are longitude/latitude
pub fn is_lat_lon(grid: &Grid) -> Result<bool, GridError> {
    Ok(spatial_ref_from(&grid.projection)?.is_geographic())
}

/// Latitude and longitude of every cell centre, each with the grid's shape.
///
/// Projected grids are transformed to EPSG:4326 in traditional GIS
/// (lon, lat) axis order.
pub fn grid_lat_lon(grid: &Grid) -> Result<(Array2<f64>, Array2<f64>), GridError> {
    let (xs, ys) = grid.cell_centres();
    let mut source = spatial_ref_from(&grid.projection)?;
    if source.is_geographic() {
        return Ok((ys, xs));
    }
    source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let mut target = SpatialRef::from_epsg(4326)?;
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let transform = CoordTransform::new(&source, &target)?;

    let shape = grid.shape();
    let mut x: Vec<f64> = xs.iter().copied().collect();
    let mut y: Vec<f64> = ys.iter().copied().collect();
    let mut z = vec![0.0; x.len()];
    transform.transform_coords(&mut x, &mut y, &mut z)?;

    let mismatch = |_| GridError::DimensionMismatch(shape.1, shape.0, shape.1, shape.0);
    let lons = Array2::from_shape_vec(shape, x).map_err(mismatch)?;
    let lats = Array2::from_shape_vec(shape, y).map_err(mismatch)?;
    Ok((lats, lons))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_epsg_from_authority_tag() {
        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984"],AUTHORITY["EPSG","4326"]]"#;
        assert_eq!(parse_epsg(wkt), Some("EPSG:4326".to_string()));
        assert_eq!(parse_epsg("LOCAL_CS[\"none\"]"), None);
    }

    #[test]
    fn bounds_subdatasets_are_skipped() {
        assert!(is_bounds_variable(r#"NETCDF:"/data/gust.nc":time_bnds"#));
        assert!(is_bounds_variable(r#"NETCDF:"/data/gust.nc":latitude_bounds"#));
        assert!(!is_bounds_variable(r#"NETCDF:"/data/gust.nc":wind_gust"#));
    }

    #[test]
    fn band_metadata_excludes_dataset_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.tif");
        let mut grid = Grid::from_array(ndarray::array![[1.0, 2.0]]);
        grid.metadata.insert("forecast_period".to_string(), "900".to_string());
        let shared = BTreeMap::from([("title".to_string(), "test".to_string())]);
        crate::io::writers::write_grids(&path, &[grid], IDENTITY_GEOTRANSFORM, "", &shared).unwrap();

        let reader = GridReader::open_field(&path).unwrap();
        let band = reader.band_metadata(1).unwrap();
        assert_eq!(band.get("forecast_period").map(String::as_str), Some("900"));
        assert!(!band.contains_key("title"));
        assert_eq!(reader.metadata_value("title").as_deref(), Some("test"));
        assert!(reader.band_metadata(2).is_err());
    }

    #[test]
    fn empty_projection_is_rejected() {
        let err = spatial_ref_from("  ").unwrap_err();
        assert!(matches!(err, GridError::UnsupportedFormat(_)));
    }
}
