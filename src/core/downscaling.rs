//! Inputs to orographic wind downscaling: loading and consistency checks.
//!
//! The roughness correction itself is not available; callers load and
//! validate the inputs and then report the correction as unsupported.
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::core::params::DownscalingParams;
use crate::io::gdal::{GridError, read_first_grid};
use crate::io::grid::Grid;

#[derive(Debug, Error)]
pub enum DownscalingError {
    #[error("{0}")]
    Grid(#[from] GridError),
    #[error("Model resolution must be a positive number of metres, got {0}")]
    InvalidResolution(f64),
    #[error("{field} grid has shape {found:?}, expected {expected:?} to match the wind speed")]
    ShapeMismatch {
        field: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Invalid height levels: {0}")]
    HeightLevels(String),
}

/// Paths of the five required input fields
#[derive(Debug, Clone)]
pub struct DownscalingPaths {
    pub wind_speed: PathBuf,
    pub aos: PathBuf,
    pub sigma: PathBuf,
    pub target_orography: PathBuf,
    pub standard_orography: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DownscalingInputs {
    pub wind_speed: Grid,
    pub aos: Grid,
    pub sigma: Grid,
    pub target_orography: Grid,
    pub standard_orography: Grid,
    pub height_levels: Option<Vec<f64>>,
    pub veg_roughness: Option<Grid>,
}

/// Heights held in a levels file, read from its first band in row-major order
fn read_height_levels(path: &Path) -> Result<Vec<f64>, GridError> {
    let grid = read_first_grid(path)?;
    Ok(grid
        .data
        .iter()
        .zip(grid.mask.iter())
        .filter(|(_, masked)| !**masked)
        .map(|(v, _)| *v)
        .collect())
}

impl DownscalingInputs {
    pub fn load(paths: &DownscalingPaths, params: &DownscalingParams) -> Result<Self, DownscalingError> {
        let read = |label: &str, path: &Path| -> Result<Grid, GridError> {
            debug!("Reading {} from {:?}", label, path);
            read_first_grid(path)
        };
        let inputs = Self {
            wind_speed: read("wind speed", &paths.wind_speed)?,
            aos: read("angle of slope", &paths.aos)?,
            sigma: read("sigma", &paths.sigma)?,
            target_orography: read("target orography", &paths.target_orography)?,
            standard_orography: read("standard orography", &paths.standard_orography)?,
            height_levels: params
                .height_levels
                .as_deref()
                .map(read_height_levels)
                .transpose()?,
            veg_roughness: params
                .veg_roughness
                .as_deref()
                .map(|p| read("vegetative roughness", p))
                .transpose()?,
        };
        Ok(inputs)
    }

    pub fn validate(&self, params: &DownscalingParams) -> Result<(), DownscalingError> {
        if !(params.model_resolution.is_finite() && params.model_resolution > 0.0) {
            return Err(DownscalingError::InvalidResolution(params.model_resolution));
        }

        let expected = self.wind_speed.shape();
        let mut grids: Vec<(&'static str, &Grid)> = vec![
            ("Angle of slope", &self.aos),
            ("Sigma", &self.sigma),
            ("Target orography", &self.target_orography),
            ("Standard orography", &self.standard_orography),
        ];
        if let Some(veg) = &self.veg_roughness {
            grids.push(("Vegetative roughness", veg));
        }
        for (field, grid) in grids {
            if grid.shape() != expected {
                return Err(DownscalingError::ShapeMismatch {
                    field,
                    expected,
                    found: grid.shape(),
                });
            }
        }

        if let Some(levels) = &self.height_levels {
            validate_height_levels(levels)?;
        }
        Ok(())
    }

    pub fn log_summary(&self, params: &DownscalingParams) {
        let (rows, cols) = self.wind_speed.shape();
        info!(
            "Wind speed {} x {} ({}), model resolution {} m",
            rows, cols, self.wind_speed.units, params.model_resolution
        );
        info!(
            "Orography range: target {:?}, standard {:?}",
            value_range(&self.target_orography),
            value_range(&self.standard_orography)
        );
        if let Some(levels) = &self.height_levels {
            info!("Output height levels: {:?}", levels);
        }
        if self.veg_roughness.is_some() {
            info!("Vegetative roughness adjustment requested");
        }
    }
}

pub fn validate_height_levels(levels: &[f64]) -> Result<(), DownscalingError> {
    if levels.is_empty() {
        return Err(DownscalingError::HeightLevels("no levels given".into()));
    }
    if let Some(bad) = levels.iter().find(|h| !h.is_finite() || **h < 0.0) {
        return Err(DownscalingError::HeightLevels(format!(
            "{} is not a non-negative height",
            bad
        )));
    }
    if levels.windows(2).any(|w| w[1] <= w[0]) {
        return Err(DownscalingError::HeightLevels(format!(
            "{:?} are not strictly increasing",
            levels
        )));
    }
    Ok(())
}

fn value_range(grid: &Grid) -> Option<(f64, f64)> {
    grid.data
        .iter()
        .zip(grid.mask.iter())
        .filter(|(_, masked)| !**masked)
        .map(|(v, _)| *v)
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
