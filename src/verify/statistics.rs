//! Binary skill statistics from accumulated contingency counts.
use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::verify::Threshold;
use crate::verify::counts::{Counts, CountsByLeadtime};

/// Probability of detection, false alarm ratio, critical success index and
/// Heidke skill score. Undefined ratios are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryStats {
    pub pod: f64,
    pub far: f64,
    pub csi: f64,
    pub hss: f64,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[value(rename_all = "UPPER")]
pub enum Stat {
    Pod,
    Far,
    Csi,
    Hss,
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stat::Pod => write!(f, "POD"),
            Stat::Far => write!(f, "FAR"),
            Stat::Csi => write!(f, "CSI"),
            Stat::Hss => write!(f, "HSS"),
        }
    }
}

impl BinaryStats {
    pub fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Pod => self.pod,
            Stat::Far => self.far,
            Stat::Csi => self.csi,
            Stat::Hss => self.hss,
        }
    }
}

/// a = hits, b = misses, c = false alarms, d = correct no-detections
pub fn calc_stats(counts: &Counts) -> BinaryStats {
    let a = counts.hits as f64;
    let b = counts.misses as f64;
    let c = counts.false_alarms as f64;
    let d = counts.no_det as f64;

    let ratio = |num: f64, den: f64| if den == 0.0 { f64::NAN } else { num / den };

    BinaryStats {
        pod: ratio(a, a + b),
        far: ratio(c, a + c),
        csi: ratio(a, a + b + c),
        hss: ratio(2.0 * (a * d - b * c), (a + c) * (c + d) + (a + b) * (b + d)),
    }
}

/// Statistics by lead time and threshold, with accessors for the two trends
/// that get tabulated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsTable {
    pub data: BTreeMap<i64, BTreeMap<Threshold, BinaryStats>>,
}

impl StatsTable {
    pub fn from_counts(counts: &CountsByLeadtime) -> Self {
        let data = counts
            .iter()
            .map(|(lt, by_thresh)| {
                let stats = by_thresh
                    .iter()
                    .map(|(thresh, c)| (*thresh, calc_stats(c)))
                    .collect();
                (*lt, stats)
            })
            .collect();
        Self { data }
    }

    pub fn leadtimes(&self) -> Vec<i64> {
        self.data.keys().copied().collect()
    }

    /// A statistic against lead time for one threshold, sorted by lead time.
    /// Lead times without that threshold are left out.
    pub fn trend_with_leadtime(&self, threshold: f64, stat: Stat) -> (Vec<i64>, Vec<f64>) {
        self.data
            .iter()
            .filter_map(|(lt, by_thresh)| {
                by_thresh
                    .iter()
                    .find(|(t, _)| t.is_close(threshold))
                    .map(|(_, s)| (*lt, s.get(stat)))
            })
            .unzip()
    }

    /// A statistic against threshold for one lead time, sorted by threshold
    pub fn trend_with_threshold(&self, leadtime: i64, stat: Stat) -> (Vec<f64>, Vec<f64>) {
        match self.data.get(&leadtime) {
            Some(by_thresh) => by_thresh.iter().map(|(t, s)| (t.0, s.get(stat))).unzip(),
            None => (Vec::new(), Vec::new()),
        }
    }
}
