//! Verification of precipitation forecasts against observations:
//! contingency counts, binary skill statistics, nowcast/NWP skill
//! crossovers and weather regime groupings.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod counts;
pub mod crossover;
pub mod regimes;
pub mod statistics;

pub use counts::{
    Counts, CountsByLeadtime, CountsRecord, ForecastField, count_records, counts_log_path,
    get_counts, model_from_path, read_count_files,
};
pub use crossover::{Crossover, SkillCrossover};
pub use statistics::{BinaryStats, Stat, StatsTable, calc_stats};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot parse counts line '{line}': {reason}")]
    Parse { line: String, reason: String },
    #[error("Observation and forecast grids differ: {obs:?} vs {fcst:?}")]
    ShapeMismatch {
        obs: (usize, usize),
        fcst: (usize, usize),
    },
    #[error("Invalid time: {0}")]
    Time(String),
    #[error("Wet / dry counts already defined for {0}")]
    DuplicateWetDry(String),
    #[error("No nowcast model found among the input files")]
    NoNowcast,
    #[error("Grid error: {0}")]
    Grid(#[from] crate::io::GridError),
}

/// Threshold value usable as an ordered map key
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(pub f64);

impl PartialEq for Threshold {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Threshold {}

impl PartialOrd for Threshold {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Threshold {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Threshold {
    /// Tolerant comparison for thresholds that went through text formatting
    pub fn is_close(self, value: f64) -> bool {
        (self.0 - value).abs() <= 1e-8 + 1e-5 * value.abs()
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
