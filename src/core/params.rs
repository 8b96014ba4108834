use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Wind downscaling parameters suitable for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownscalingParams {
    /// Grid spacing of the source model in metres
    pub model_resolution: f64,
    /// File of heights (m) at which to output wind speed; None keeps the input levels
    pub height_levels: Option<PathBuf>,
    /// Vegetative roughness length file; None means no vegetation adjustment
    pub veg_roughness: Option<PathBuf>,
}

impl Default for DownscalingParams {
    fn default() -> Self {
        Self {
            model_resolution: f64::NAN,
            height_levels: None,
            veg_roughness: None,
        }
    }
}

/// Inclusive date window for skill crossover analysis, as YYYYMMDD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub startdate: u32,
    pub enddate: u32,
}

impl DateWindow {
    /// Window used when counts are aggregated over all available data
    pub const UNBOUNDED: DateWindow = DateWindow {
        startdate: 0,
        enddate: 20500101,
    };
}

impl Default for DateWindow {
    /// Summer 2020 trial period
    fn default() -> Self {
        Self {
            startdate: 20200601,
            enddate: 20200731,
        }
    }
}
