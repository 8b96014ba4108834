//! In-memory gridded field: data, missing-value mask, georeferencing and
//! the metadata that travels with it between readers, plugins and writers.
use std::collections::BTreeMap;

use ndarray::{Array2, Zip};

use crate::io::gdal::GridError;

/// Geotransform used when a dataset carries none
pub const IDENTITY_GEOTRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// A single 2-D field on a regular grid
#[derive(Debug, Clone)]
pub struct Grid {
    /// Values with shape (rows, cols)
    pub data: Array2<f64>,
    /// True where the value is missing
    pub mask: Array2<bool>,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format or `EPSG:n`
    pub projection: String,
    pub units: String,
    pub name: String,
    pub metadata: BTreeMap<String, String>,
}

// Factors to SI (m s-1) for the precipitation rate units seen on inputs
fn rate_factor(units: &str) -> Option<f64> {
    match units.trim() {
        "m s-1" | "m/s" => Some(1.0),
        "mm h-1" | "mm/h" | "mm hr-1" => Some(1.0 / 3.6e6),
        "mm s-1" | "mm/s" => Some(1.0e-3),
        "kg m-2 s-1" => Some(1.0e-3),
        _ => None,
    }
}

impl Grid {
    /// Build an unmasked grid with identity georeferencing
    pub fn from_array(data: Array2<f64>) -> Self {
        let mask = data.mapv(f64::is_nan);
        Self {
            data,
            mask,
            geotransform: IDENTITY_GEOTRANSFORM,
            projection: String::new(),
            units: String::new(),
            name: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.shape() == other.shape()
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }

    /// Convert data in place to `target` units.
    ///
    /// Identical unit strings are a no-op; otherwise both units must be
    /// precipitation rate units with a known factor.
    pub fn convert_units(&mut self, target: &str) -> Result<(), GridError> {
        if self.units.trim() == target.trim() {
            return Ok(());
        }
        let (from, to) = match (rate_factor(&self.units), rate_factor(target)) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                return Err(GridError::Units {
                    from: self.units.clone(),
                    to: target.to_string(),
                });
            }
        };
        let scale = from / to;
        self.data.mapv_inplace(|v| v * scale);
        self.units = target.to_string();
        Ok(())
    }

    /// Projected x/y of each cell centre, computed from the geotransform.
    pub fn cell_centres(&self) -> (Array2<f64>, Array2<f64>) {
        let gt = self.geotransform;
        let shape = self.shape();
        let mut xs = Array2::<f64>::zeros(shape);
        let mut ys = Array2::<f64>::zeros(shape);
        Zip::indexed(&mut xs)
            .and(&mut ys)
            .for_each(|(row, col), x, y| {
                let c = col as f64 + 0.5;
                let r = row as f64 + 0.5;
                *x = gt[0] + c * gt[1] + r * gt[2];
                *y = gt[3] + c * gt[4] + r * gt[5];
            });
        (xs, ys)
    }

    /// Centre coordinate of every column along x (row 0, no rotation assumed)
    pub fn x_points(&self) -> Vec<f64> {
        let gt = self.geotransform;
        (0..self.cols())
            .map(|c| gt[0] + (c as f64 + 0.5) * gt[1])
            .collect()
    }

    /// Centre coordinate of every row along y (column 0, no rotation assumed)
    pub fn y_points(&self) -> Vec<f64> {
        let gt = self.geotransform;
        (0..self.rows())
            .map(|r| gt[3] + (r as f64 + 0.5) * gt[5])
            .collect()
    }

    /// Numeric metadata item, also looked for as a netCDF dimension value or
    /// global attribute
    pub fn metadata_number(&self, key: &str) -> Option<f64> {
        [
            key.to_string(),
            format!("NETCDF_DIM_{}", key),
            format!("NC_GLOBAL#{}", key),
        ]
        .iter()
        .find_map(|k| self.metadata.get(k))
        .and_then(|v| v.trim().parse().ok())
    }

    /// Latitude and longitude of every cell centre
    pub fn lat_lon(&self) -> Result<(Array2<f64>, Array2<f64>), GridError> {
        crate::io::gdal::grid_lat_lon(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn nan_cells_start_masked() {
        let grid = Grid::from_array(array![[1.0, f64::NAN], [3.0, 4.0]]);
        assert!(grid.mask[[0, 1]]);
        assert_eq!(grid.valid_count(), 3);
    }

    #[test]
    fn converts_si_rate_to_mm_per_hour() {
        let mut grid = Grid::from_array(array![[1.0e-6, 0.0]]);
        grid.units = "m s-1".to_string();
        grid.convert_units("mm h-1").unwrap();
        assert_relative_eq!(grid.data[[0, 0]], 3.6, epsilon = 1e-12);
        assert_eq!(grid.units, "mm h-1");
    }

    #[test]
    fn rejects_unknown_units() {
        let mut grid = Grid::from_array(array![[1.0]]);
        grid.units = "K".to_string();
        let err = grid.convert_units("mm h-1").unwrap_err();
        assert!(matches!(err, GridError::Units { .. }));
    }

    #[test]
    fn cell_centres_follow_geotransform() {
        let mut grid = Grid::from_array(Array2::zeros((2, 3)));
        grid.geotransform = [100.0, 10.0, 0.0, 500.0, 0.0, -20.0];
        let (xs, ys) = grid.cell_centres();
        assert_relative_eq!(xs[[1, 2]], 125.0);
        assert_relative_eq!(ys[[1, 2]], 470.0);
        assert_eq!(grid.x_points(), vec![105.0, 115.0, 125.0]);
        assert_eq!(grid.y_points(), vec![490.0, 470.0]);
    }

    #[test]
    fn numeric_metadata_from_netcdf_keys() {
        let mut grid = Grid::from_array(array![[1.0]]);
        grid.metadata.insert("NETCDF_DIM_time".to_string(), "1590969600".to_string());
        grid.metadata.insert("forecast_period".to_string(), " 900 ".to_string());
        assert_eq!(grid.metadata_number("time"), Some(1_590_969_600.0));
        assert_eq!(grid.metadata_number("forecast_period"), Some(900.0));
        assert_eq!(grid.metadata_number("blend_time"), None);
    }
}
