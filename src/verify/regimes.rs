//! European weather regimes and their grouping into clusters.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::verify::VerifyError;

/// Regimes making up each of the eight clusters
pub const CLUSTERS: [(u32, &[u32]); 8] = [
    (1, &[6, 9, 11, 19, 25, 27, 28]),
    (2, &[4, 8, 20, 23, 26, 30]),
    (3, &[1, 13, 14, 24]),
    (4, &[2, 12, 15, 21]),
    (5, &[5, 16, 17, 22]),
    (6, &[3, 18]),
    (7, &[7, 29]),
    (8, &[10]),
];

/// Regimes in which the nowcast tends to perform well
pub const GOOD_REGIMES: [u32; 3] = [5, 6, 24];
/// Regimes in which the nowcast tends to perform poorly
pub const BAD_REGIMES: [u32; 3] = [1, 8, 10];

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeSubset {
    Good,
    Bad,
}

impl RegimeSubset {
    pub fn contains(self, regime: u32) -> bool {
        match self {
            RegimeSubset::Good => GOOD_REGIMES.contains(&regime),
            RegimeSubset::Bad => BAD_REGIMES.contains(&regime),
        }
    }
}

pub fn cluster_of(regime: u32) -> Option<u32> {
    CLUSTERS
        .iter()
        .find(|(_, members)| members.contains(&regime))
        .map(|(cluster, _)| *cluster)
}

/// Cluster for every regime given; unknown regimes are left out
pub fn cluster_mapping<I: IntoIterator<Item = u32>>(regimes: I) -> BTreeMap<u32, u32> {
    regimes
        .into_iter()
        .filter_map(|r| cluster_of(r).map(|c| (r, c)))
        .collect()
}

/// Daily regimes from lines of `YYYYMMDD REGIME`. Blank lines are skipped.
pub fn read_regimes(path: &Path) -> Result<BTreeMap<u32, u32>, VerifyError> {
    let reader = BufReader::new(File::open(path)?);
    let mut regimes = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let (Some(day), Some(regime)) = (fields.next(), fields.next()) else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(VerifyError::Parse {
                line,
                reason: "expected 'YYYYMMDD REGIME'".into(),
            });
        };
        let parse = |field: &str| {
            field.parse::<u32>().map_err(|e| VerifyError::Parse {
                line: line.clone(),
                reason: e.to_string(),
            })
        };
        regimes.insert(parse(day)?, parse(regime)?);
    }
    Ok(regimes)
}
