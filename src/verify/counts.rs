//! Contingency counts (hits, misses, false alarms, correct no-detections)
//! and the whitespace-separated counts log they are appended to.
//!
//! One log line per lead time and threshold:
//! `YYYYMMDDTHHMMZ lead_time_mins threshold_mmh hits misses false_alarms no_det`
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::temporal::{cycletime_day, datetime_to_cycletime};
use crate::io::grid::Grid;
use crate::verify::{Threshold, VerifyError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub hits: u64,
    pub misses: u64,
    pub false_alarms: u64,
    pub no_det: u64,
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.misses += rhs.misses;
        self.false_alarms += rhs.false_alarms;
        self.no_det += rhs.no_det;
    }
}

impl Counts {
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.false_alarms + self.no_det
    }
}

/// Count the four contingency outcomes at `threshold`, skipping cells that
/// are masked in either field.
pub fn get_counts(obs: &Grid, fcst: &Grid, threshold: f64) -> Result<Counts, VerifyError> {
    if !obs.same_shape(fcst) {
        return Err(VerifyError::ShapeMismatch {
            obs: obs.shape(),
            fcst: fcst.shape(),
        });
    }
    let mut counts = Counts::default();
    Zip::from(&obs.data)
        .and(&obs.mask)
        .and(&fcst.data)
        .and(&fcst.mask)
        .for_each(|&o, &o_masked, &f, &f_masked| {
            if o_masked || f_masked {
                return;
            }
            match (o >= threshold, f >= threshold) {
                (true, true) => counts.hits += 1,
                (true, false) => counts.misses += 1,
                (false, true) => counts.false_alarms += 1,
                (false, false) => counts.no_det += 1,
            }
        });
    Ok(counts)
}

/// Shortest general-format rendering with `precision` significant digits.
///
/// Fixed notation keeps at least one digit after the decimal point (`1.0`);
/// very small or large values switch to exponent form (`1e+02`).
pub fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= precision as i32 - 1 {
        let mantissa = if mantissa.contains('.') {
            mantissa.trim_end_matches('0').trim_end_matches('.')
        } else {
            mantissa
        };
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }

    let decimals = (precision as i32 - 1 - exp).max(0) as usize;
    let fixed = format!("{:.*}", decimals, value);
    if fixed.contains('.') {
        let trimmed = fixed.trim_end_matches('0');
        if trimmed.ends_with('.') {
            format!("{}0", trimmed)
        } else {
            trimmed.to_string()
        }
    } else {
        format!("{}.0", fixed)
    }
}

/// One line of a counts log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountsRecord {
    /// Validity time in `YYYYMMDDTHHMMZ` form
    pub cycletime: String,
    pub lead_time: i64,
    pub threshold: f64,
    pub counts: Counts,
}

impl CountsRecord {
    pub fn to_line(&self) -> String {
        format!(
            "{} {:3} {:>5} {:6} {:6} {:6} {:6}",
            self.cycletime,
            self.lead_time,
            format_general(self.threshold, 3),
            self.counts.hits,
            self.counts.misses,
            self.counts.false_alarms,
            self.counts.no_det
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, VerifyError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let bad = |reason: String| VerifyError::Parse {
            line: line.trim_end().to_string(),
            reason,
        };
        if fields.len() != 7 {
            return Err(bad(format!("expected 7 fields, found {}", fields.len())));
        }
        let int = |s: &str| s.parse::<u64>().map_err(|e| bad(format!("'{}': {}", s, e)));
        Ok(CountsRecord {
            cycletime: fields[0].to_string(),
            lead_time: fields[1]
                .parse()
                .map_err(|e| bad(format!("lead time '{}': {}", fields[1], e)))?,
            threshold: fields[2]
                .parse()
                .map_err(|e| bad(format!("threshold '{}': {}", fields[2], e)))?,
            counts: Counts {
                hits: int(fields[3])?,
                misses: int(fields[4])?,
                false_alarms: int(fields[5])?,
                no_det: int(fields[6])?,
            },
        })
    }
}

/// `dir/{YYYYMM}_{model}_counts.log`
pub fn counts_log_path(dir: &Path, cycletime: &str, model: &str) -> PathBuf {
    let month = cycletime.get(..6).unwrap_or(cycletime);
    dir.join(format!("{}_{}_counts.log", month, model))
}

/// Model name encoded in a counts log file name
pub fn model_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.split('_').nth(1).map(str::to_string)
}

/// A forecast field with the times needed to match it against observations
#[derive(Debug, Clone)]
pub struct ForecastField {
    pub grid: Grid,
    pub validity: DateTime<Utc>,
    /// Forecast period in minutes
    pub lead_time: i64,
}

/// Counts for every forecast valid at `obs_time` and every threshold.
///
/// Forecasts valid at other times are skipped without error; a model
/// without output at this exact time is expected.
pub fn count_records(
    obs: &Grid,
    obs_time: DateTime<Utc>,
    forecasts: &[ForecastField],
    thresholds: &[f64],
) -> Result<Vec<CountsRecord>, VerifyError> {
    let cycletime = datetime_to_cycletime(&obs_time);
    let mut records = Vec::new();
    for fcst in forecasts {
        if fcst.validity != obs_time {
            debug!(
                "Skipping forecast valid at {} (observation at {})",
                fcst.validity, obs_time
            );
            continue;
        }
        for &threshold in thresholds {
            let counts = get_counts(obs, &fcst.grid, threshold)?;
            debug!(
                "T+{} at {} mm/h: {} cell(s) counted",
                fcst.lead_time,
                threshold,
                counts.total()
            );
            records.push(CountsRecord {
                cycletime: cycletime.clone(),
                lead_time: fcst.lead_time,
                threshold,
                counts,
            });
        }
    }
    Ok(records)
}

/// Append records to a counts log, creating it if needed
pub fn append_records(path: &Path, records: &[CountsRecord]) -> Result<(), VerifyError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        writeln!(file, "{}", record.to_line())?;
    }
    info!("Appended {} line(s) to {:?}", records.len(), path);
    Ok(())
}

/// Read every record of a counts log
pub fn read_records(path: &Path) -> Result<Vec<CountsRecord>, VerifyError> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(CountsRecord::parse_line(&line)?);
    }
    Ok(records)
}

pub type CountsByLeadtime = BTreeMap<i64, BTreeMap<Threshold, Counts>>;

/// Sum counts by lead time and threshold over lines dated strictly between
/// `startdate` and `enddate` (both `YYYYMMDD`).
pub fn read_count_files<P: AsRef<Path>>(
    files: &[P],
    startdate: u32,
    enddate: u32,
) -> Result<CountsByLeadtime, VerifyError> {
    let mut by_leadtime = CountsByLeadtime::new();
    for path in files {
        for record in read_records(path.as_ref())? {
            let day = cycletime_day(&record.cycletime)
                .ok_or_else(|| VerifyError::Time(record.cycletime.clone()))?;
            if day > startdate && day < enddate {
                *by_leadtime
                    .entry(record.lead_time)
                    .or_default()
                    .entry(Threshold(record.threshold))
                    .or_default() += record.counts;
            }
        }
    }
    Ok(by_leadtime)
}
