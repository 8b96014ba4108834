//! Shared enums used across the command-line tools.
//! Includes `CrossoverThreshold`, plus re-exports of `Stat` and `RegimeSubset`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub use crate::verify::regimes::RegimeSubset;
pub use crate::verify::statistics::Stat;

/// Which rain-rate threshold the skill crossover is computed at
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrossoverThreshold {
    /// 0.03 mm/h, rain / no rain
    #[default]
    Zero,
    /// 1 mm/h
    One,
}

impl CrossoverThreshold {
    pub fn is_zero(self) -> bool {
        matches!(self, CrossoverThreshold::Zero)
    }

    pub fn value_mmh(self) -> f64 {
        match self {
            CrossoverThreshold::Zero => crate::verify::crossover::ZERO_THRESHOLD,
            CrossoverThreshold::One => crate::verify::crossover::ONE_MM_THRESHOLD,
        }
    }
}

impl std::fmt::Display for CrossoverThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrossoverThreshold::Zero => write!(f, "zero"),
            CrossoverThreshold::One => write!(f, "one"),
        }
    }
}
