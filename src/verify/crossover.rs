//! Lead time at which nowcast skill drops below the NWP model.
//!
//! Counts logs from one nowcast and from the UKV are regrouped by the
//! forecast cycle that produced each line. For every complete hourly cycle
//! the CSI-with-lead-time curves of the two systems are intersected.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::temporal::{cycletime_day, cycletime_to_datetime, datetime_to_cycletime};
use crate::verify::VerifyError;
use crate::verify::counts::{model_from_path, read_records};

/// Name of the reference NWP model in counts log file names
pub const NWP_MODEL: &str = "UKV";
/// "Zero" (rain / no rain) threshold in mm h-1
pub const ZERO_THRESHOLD: f64 = 0.03;
pub const ONE_MM_THRESHOLD: f64 = 1.0;

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

fn csi(hits: u64, misses: u64, false_alarms: u64) -> f64 {
    let den = (hits + misses + false_alarms) as f64;
    if den > 0.0 { hits as f64 / den } else { f64::NAN }
}

/// Lead times each system is expected to provide, in minutes
pub fn expected_leadtimes(model: &str) -> Vec<i64> {
    if model == NWP_MODEL {
        (60..=360).step_by(60).collect()
    } else {
        (15..=360).step_by(15).collect()
    }
}

/// CSI by lead time at the two thresholds of interest
#[derive(Debug, Clone, Default)]
pub struct ModelSeries {
    pub csi_zero: BTreeMap<i64, f64>,
    pub csi_one: BTreeMap<i64, f64>,
}

impl ModelSeries {
    pub fn series(&self, zero_threshold: bool) -> &BTreeMap<i64, f64> {
        if zero_threshold { &self.csi_zero } else { &self.csi_one }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleData {
    pub models: BTreeMap<String, ModelSeries>,
    pub wet_pixels: Option<u64>,
    pub dry_pixels: Option<u64>,
}

/// One nowcast / NWP crossover
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crossover {
    pub cycle: String,
    /// Wet pixels in the radar image that initialised the nowcast
    pub wet_pixels: u64,
    /// Wet pixels as a fraction of all valid pixels
    pub wet_fraction: f64,
    /// Crossover lead time in minutes
    pub time: f64,
    pub csi: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SkillCrossover {
    pub nowcast: String,
    pub data: BTreeMap<String, CycleData>,
}

impl SkillCrossover {
    /// Read counts logs and keep complete hourly cycles whose day lies
    /// within `startdate..=enddate`.
    pub fn from_files<P: AsRef<Path>>(
        files: &[P],
        startdate: u32,
        enddate: u32,
    ) -> Result<Self, VerifyError> {
        let mut nowcast: Option<String> = None;
        let mut data: BTreeMap<String, CycleData> = BTreeMap::new();

        for path in files {
            let path = path.as_ref();
            let model = model_from_path(path).unwrap_or_default();
            info!("Reading {} data from {:?}", model, path);
            let is_nowcast = model != NWP_MODEL;
            if is_nowcast && nowcast.is_none() {
                nowcast = Some(model.clone());
            }

            for record in read_records(path)? {
                let cycle = cycle_of(&record.cycletime, record.lead_time)?;
                let day = cycletime_day(&cycle).ok_or_else(|| VerifyError::Time(cycle.clone()))?;
                if day < startdate || day > enddate || !cycle.ends_with("00Z") {
                    continue;
                }

                let entry = data.entry(cycle.clone()).or_default();
                let series = entry.models.entry(model.clone()).or_default();
                let c = record.counts;
                if is_close(record.threshold, ZERO_THRESHOLD) {
                    series
                        .csi_zero
                        .insert(record.lead_time, csi(c.hits, c.misses, c.false_alarms));
                    // Crude count of rain in the input radar from the first nowcast step
                    if is_nowcast && record.lead_time == 15 {
                        if entry.wet_pixels.is_some() {
                            return Err(VerifyError::DuplicateWetDry(cycle));
                        }
                        entry.wet_pixels = Some(c.hits + c.misses);
                        entry.dry_pixels = Some(c.false_alarms + c.no_det);
                    }
                } else if is_close(record.threshold, ONE_MM_THRESHOLD) {
                    series
                        .csi_one
                        .insert(record.lead_time, csi(c.hits, c.misses, c.false_alarms));
                }
            }
        }

        let nowcast = nowcast.ok_or(VerifyError::NoNowcast)?;
        info!("Read {} cycles", data.len());
        let mut crossover = SkillCrossover { nowcast, data };
        crossover.check_data();
        info!("Retained {} cycles for analysis", crossover.data.len());
        Ok(crossover)
    }

    /// Drop cycles without wet/dry counts, with unexpected models, or with
    /// missing lead times.
    fn check_data(&mut self) {
        let expected_models: BTreeSet<&str> = [NWP_MODEL, self.nowcast.as_str()].into();
        self.data.retain(|cycle, entry| {
            if entry.wet_pixels.is_none() || entry.dry_pixels.is_none() {
                debug!("{} has no wet / dry counts - removing cycle", cycle);
                return false;
            }
            let models: BTreeSet<&str> = entry.models.keys().map(String::as_str).collect();
            if models != expected_models {
                debug!("{} has models {:?}, expected {:?} - removing cycle", cycle, models, expected_models);
                return false;
            }
            for (model, series) in &entry.models {
                let missing: Vec<i64> = expected_leadtimes(model)
                    .into_iter()
                    .filter(|lt| !series.csi_zero.contains_key(lt))
                    .collect();
                if !missing.is_empty() {
                    debug!("{} {} missing lead times {:?} - removing cycle", cycle, model, missing);
                    return false;
                }
            }
            true
        });
    }

    /// Crossover time and CSI for every cycle where both curves are valid.
    ///
    /// `zero_threshold` selects the 0.03 mm/h curves, otherwise 1 mm/h.
    pub fn calculate_crossovers(&self, zero_threshold: bool) -> Vec<Crossover> {
        let mut result = Vec::new();
        for (cycle, entry) in &self.data {
            let (Some(nc), Some(ukv)) = (
                entry.models.get(&self.nowcast),
                entry.models.get(NWP_MODEL),
            ) else {
                continue;
            };
            let nc = nc.series(zero_threshold);
            let ukv = ukv.series(zero_threshold);
            if nc.values().any(|v| v.is_nan()) || ukv.values().any(|v| v.is_nan()) {
                continue;
            }
            let Some((time, csi)) = find_crossover(nc, ukv) else {
                continue;
            };
            let wet = entry.wet_pixels.unwrap_or(0);
            let dry = entry.dry_pixels.unwrap_or(0);
            let total = (wet + dry) as f64;
            result.push(Crossover {
                cycle: cycle.clone(),
                wet_pixels: wet,
                wet_fraction: if total > 0.0 { wet as f64 / total } else { f64::NAN },
                time,
                csi,
            });
        }
        result
    }
}

/// Forecast cycle that produced a line valid at `validity` with `lead_time`
fn cycle_of(validity: &str, lead_time: i64) -> Result<String, VerifyError> {
    let vt = cycletime_to_datetime(validity)
        .map_err(|e| VerifyError::Time(format!("{}: {}", validity, e)))?;
    Ok(datetime_to_cycletime(&(vt - Duration::minutes(lead_time))))
}

/// First point at which the nowcast CSI curve meets or drops below the NWP
/// curve, as (lead time in minutes, CSI).
pub fn find_crossover(nc: &BTreeMap<i64, f64>, ukv: &BTreeMap<i64, f64>) -> Option<(f64, f64)> {
    for (&lt, &ukv_csi) in ukv {
        let nc_csi = *nc.get(&lt)?;
        if nc_csi > ukv_csi {
            continue;
        }

        if lt == 60 {
            // Already behind at T+1: go back to the earliest nowcast step that
            // still beat the UKV at T+1
            let mut tcross = 15.0;
            for nclt in [45, 30, 15] {
                if nc.get(&nclt).is_some_and(|v| *v > ukv_csi) {
                    tcross = nclt as f64;
                }
            }
            return Some((tcross, ukv_csi));
        }

        // Look back over the previous hour in 15 minute steps
        let ukv0 = *ukv.get(&(lt - 60))?;
        let diff = ukv_csi - ukv0;
        let mut ukv_interp = [0.0; 5];
        let mut nc_interp = [0.0; 5];
        for i in 0..5 {
            ukv_interp[i] = ukv0 + i as f64 * diff / 4.0;
            nc_interp[i] = *nc.get(&(lt - (4 - i as i64) * 15))?;
        }
        for i in 0..4 {
            if nc_interp[i + 1] <= ukv_interp[i + 1] {
                // nc = a t + b ; ukv = c t + d over this 15 minute step
                let a = (nc_interp[i + 1] - nc_interp[i]) / 15.0;
                let b = nc_interp[i];
                let c = (ukv_interp[i + 1] - ukv_interp[i]) / 15.0;
                let d = ukv_interp[i];
                let dt_cross = (d - b) / (a - c);
                let csi_cross = a * dt_cross + b;
                let t_cross = dt_cross + (lt - 60 + i as i64 * 15) as f64;
                return Some((t_cross, csi_cross));
            }
        }
        return None;
    }
    None
}
