//! Thinned spatial cutouts of gridded data.
use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::io::grid::Grid;

#[derive(Debug, Error)]
pub enum SubsetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid grid spec: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Grid spec has no entry for coordinate '{0}'")]
    MissingCoordinate(String),
    #[error("Thinning factor for '{0}' must be at least 1")]
    ZeroThin(String),
    #[error("No points of '{coord}' lie between {min} and {max}")]
    EmptySelection { coord: String, min: f64, max: f64 },
    #[error("Rotated grids cannot be subset")]
    Rotated,
}

/// Bounds and thinning factor along one spatial coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub min: f64,
    pub max: f64,
    /// Keep every `thin`-th point inside the bounds
    pub thin: usize,
}

/// Cutout definition keyed by coordinate name, e.g.
/// `{"projection_x_coordinate": {"min": -1e5, "max": 1e5, "thin": 5}, ...}`
///
/// A file normally carries entries for both the projected and the
/// latitude/longitude grids so that one spec serves every model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    #[serde(flatten)]
    pub axes: BTreeMap<String, AxisSpec>,
}

impl GridSpec {
    pub fn from_json_str(text: &str) -> Result<Self, SubsetError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, SubsetError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn axis(&self, name: &str) -> Result<AxisSpec, SubsetError> {
        let spec = self
            .axes
            .get(name)
            .copied()
            .ok_or_else(|| SubsetError::MissingCoordinate(name.to_string()))?;
        if spec.thin == 0 {
            return Err(SubsetError::ZeroThin(name.to_string()));
        }
        Ok(spec)
    }
}

/// Names of the (x, y) coordinates used for a grid
pub fn coordinate_names(lat_lon: bool) -> (&'static str, &'static str) {
    if lat_lon {
        ("longitude", "latitude")
    } else {
        ("projection_x_coordinate", "projection_y_coordinate")
    }
}

fn select_indices(points: &[f64], name: &str, spec: AxisSpec) -> Result<Vec<usize>, SubsetError> {
    let indices: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| **p >= spec.min && **p <= spec.max)
        .map(|(i, _)| i)
        .step_by(spec.thin)
        .collect();
    if indices.is_empty() {
        return Err(SubsetError::EmptySelection {
            coord: name.to_string(),
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(indices)
}

/// Extract the thinned cutout described by `spec`.
///
/// `lat_lon` selects which coordinate entries of the spec apply.
pub fn subset_grid(grid: &Grid, spec: &GridSpec, lat_lon: bool) -> Result<Grid, SubsetError> {
    let gt = grid.geotransform;
    if gt[2] != 0.0 || gt[4] != 0.0 {
        return Err(SubsetError::Rotated);
    }
    let (x_name, y_name) = coordinate_names(lat_lon);
    let x_spec = spec.axis(x_name)?;
    let y_spec = spec.axis(y_name)?;

    let cols = select_indices(&grid.x_points(), x_name, x_spec)?;
    let rows = select_indices(&grid.y_points(), y_name, y_spec)?;

    let data = grid.data.select(Axis(0), &rows).select(Axis(1), &cols);
    let mask = grid.mask.select(Axis(0), &rows).select(Axis(1), &cols);

    // Keep the retained cell centres where they were on the source grid
    let mut geotransform = gt;
    geotransform[1] = gt[1] * x_spec.thin as f64;
    geotransform[5] = gt[5] * y_spec.thin as f64;
    geotransform[0] = gt[0] + (cols[0] as f64 + 0.5) * gt[1] - 0.5 * geotransform[1];
    geotransform[3] = gt[3] + (rows[0] as f64 + 0.5) * gt[5] - 0.5 * geotransform[5];

    info!(
        "Subset {}x{} -> {}x{} (thin x={}, y={})",
        grid.cols(),
        grid.rows(),
        cols.len(),
        rows.len(),
        x_spec.thin,
        y_spec.thin
    );

    Ok(Grid {
        data,
        mask,
        geotransform,
        projection: grid.projection.clone(),
        units: grid.units.clone(),
        name: grid.name.clone(),
        metadata: grid.metadata.clone(),
    })
}
