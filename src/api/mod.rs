//! High-level library API: one entry point per command-line tool, taking
//! paths and typed options and returning typed results. Prefer these over
//! the lower-level `core`, `io` and `verify` modules when embedding the tools.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::downscaling::{DownscalingInputs, DownscalingPaths};
use crate::core::metadata::{CubeMetadata, MetadataInterpreter, display_interpretation};
use crate::core::params::{DateWindow, DownscalingParams};
use crate::core::solar::DayNightMask;
use crate::core::subset::{GridSpec, subset_grid};
use crate::core::temporal::{
    cycletime_day, cycletime_to_datetime, datetime_to_cycletime, seconds_to_datetime,
};
use crate::error::{Error, Result};
use crate::io::gdal::{GridReader, is_lat_lon, read_first_grid};
use crate::io::grid::Grid;
use crate::io::writers::{provenance_fields, write_grid, write_grids};
use crate::types::{CrossoverThreshold, RegimeSubset};
use crate::verify::counts::{append_records, count_records, counts_log_path, model_from_path};
use crate::verify::crossover::{Crossover, SkillCrossover};
use crate::verify::regimes::{cluster_of, read_regimes};
use crate::verify::statistics::StatsTable;
use crate::verify::{ForecastField, read_count_files};

/// Units in which precipitation counts are computed
pub const COUNTS_UNITS: &str = "mm h-1";

fn parse_cycletime(arg: &'static str, value: &str) -> Result<DateTime<Utc>> {
    cycletime_to_datetime(value).map_err(|_| Error::InvalidArgument {
        arg,
        value: value.to_string(),
    })
}

/// Validity time from a grid's `time` metadata (seconds since epoch)
pub fn grid_validity_time(grid: &Grid) -> Option<DateTime<Utc>> {
    grid.metadata_number("time")
        .and_then(|secs| seconds_to_datetime(secs.round() as i64))
}

/// Lead time in minutes from `forecast_period` (seconds), or from the
/// difference between validity and `forecast_reference_time`.
pub fn grid_lead_time(grid: &Grid, validity: DateTime<Utc>) -> Option<i64> {
    if let Some(period) = grid.metadata_number("forecast_period") {
        return Some((period / 60.0).round() as i64);
    }
    let frt = grid
        .metadata_number("forecast_reference_time")
        .and_then(|secs| seconds_to_datetime(secs.round() as i64))?;
    Some((validity - frt).num_minutes())
}

/// Load and validate wind downscaling inputs.
///
/// The orographic roughness correction is not available, so a fully
/// validated set of inputs still ends in `Error::Unsupported`.
pub fn downscale_wind_to_path(
    paths: &DownscalingPaths,
    params: &DownscalingParams,
    output: &Path,
) -> Result<()> {
    let inputs = DownscalingInputs::load(paths, params)?;
    inputs.validate(params)?;
    inputs.log_summary(params);
    warn!("No output written to {:?}", output);
    Err(Error::Unsupported("orographic roughness correction".to_string()))
}

/// Day/night masks on the grid of `reference`, one band per time, written to
/// `output`. Returns the number of bands written.
pub fn daynight_mask_to_path(reference: &Path, output: &Path, times: &[String]) -> Result<usize> {
    let times = times
        .iter()
        .map(|t| parse_cycletime("time", t))
        .collect::<Result<Vec<_>>>()?;
    let grid = read_first_grid(reference)?;
    let plugin = DayNightMask::new();
    info!("{} on {}x{} grid", plugin, grid.rows(), grid.cols());
    let masks = plugin.process(&grid, &times)?;

    let mut metadata = provenance_fields();
    metadata.insert("long_name".to_string(), "day_night_mask".to_string());
    metadata.insert("units".to_string(), "1".to_string());
    write_grids(output, &masks, grid.geotransform, &grid.projection, &metadata)?;
    Ok(masks.len())
}

/// Contingency counts of forecasts against an observation, appended to the
/// model's monthly counts log. Returns the log path.
pub fn aggregate_counts(
    obs_path: &Path,
    forecast_paths: &[PathBuf],
    log_dir: &Path,
    model: &str,
    thresholds: &[f64],
    cycletime: Option<&str>,
) -> Result<PathBuf> {
    let mut obs = read_first_grid(obs_path)?;
    obs.convert_units(COUNTS_UNITS)?;
    let obs_time = match cycletime {
        Some(ct) => parse_cycletime("cycletime", ct)?,
        None => grid_validity_time(&obs)
            .ok_or_else(|| Error::MissingMetadata(format!("time on {}", obs_path.display())))?,
    };
    info!("Observation at {} with {} valid cell(s)", obs_time, obs.valid_count());

    let mut forecasts = Vec::new();
    for path in forecast_paths {
        for mut grid in GridReader::open(path)?.read_all()? {
            grid.convert_units(COUNTS_UNITS)?;
            let validity = grid_validity_time(&grid).unwrap_or(obs_time);
            let lead_time = grid_lead_time(&grid, validity).ok_or_else(|| {
                Error::MissingMetadata(format!("forecast_period on {}", path.display()))
            })?;
            forecasts.push(ForecastField {
                grid,
                validity,
                lead_time,
            });
        }
    }

    let records = count_records(&obs, obs_time, &forecasts, thresholds)?;
    let cycletime = datetime_to_cycletime(&obs_time);
    let log_path = counts_log_path(log_dir, &cycletime, model);
    append_records(&log_path, &records)?;
    Ok(log_path)
}

/// Count files grouped by the model named in each file name
pub fn group_by_model<P: AsRef<Path>>(files: &[P]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let path = file.as_ref();
        let model = model_from_path(path).unwrap_or_else(|| "unknown".to_string());
        groups.entry(model).or_default().push(path.to_path_buf());
    }
    groups
}

/// Skill statistics per model from counts logs, over lines dated strictly
/// inside `window`
pub fn stats_by_model<P: AsRef<Path>>(
    files: &[P],
    window: DateWindow,
) -> Result<BTreeMap<String, StatsTable>> {
    let mut tables = BTreeMap::new();
    for (model, paths) in group_by_model(files) {
        let counts = read_count_files(&paths, window.startdate, window.enddate)?;
        info!("{}: {} lead time(s)", model, counts.len());
        tables.insert(model, StatsTable::from_counts(&counts));
    }
    Ok(tables)
}

/// A crossover tagged with the weather regime of its day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossoverRow {
    #[serde(flatten)]
    pub crossover: Crossover,
    pub regime: Option<u32>,
    pub cluster: Option<u32>,
}

/// Nowcast/UKV crossovers for each complete cycle in `window`.
///
/// With `regimes`, rows are tagged with the day's regime and, if `subset`
/// is given, restricted to that regime group.
pub fn skill_crossovers<P: AsRef<Path>>(
    files: &[P],
    window: DateWindow,
    threshold: CrossoverThreshold,
    regimes: Option<&Path>,
    subset: Option<RegimeSubset>,
) -> Result<Vec<CrossoverRow>> {
    let analysis = SkillCrossover::from_files(files, window.startdate, window.enddate)?;
    let crossovers = analysis.calculate_crossovers(threshold.is_zero());
    info!(
        "{} crossover(s) at the {} mm/h threshold",
        crossovers.len(),
        threshold.value_mmh()
    );

    let regimes = regimes.map(read_regimes).transpose()?;
    if subset.is_some() && regimes.is_none() {
        return Err(Error::InvalidArgument {
            arg: "subset",
            value: "requires --regimes".to_string(),
        });
    }

    let mut rows = Vec::new();
    for crossover in crossovers {
        let regime = regimes.as_ref().and_then(|r| {
            cycletime_day(&crossover.cycle).and_then(|day| r.get(&day).copied())
        });
        if let Some(subset) = subset {
            if !regime.is_some_and(|r| subset.contains(r)) {
                continue;
            }
        }
        rows.push(CrossoverRow {
            crossover,
            regime,
            cluster: regime.and_then(cluster_of),
        });
    }
    Ok(rows)
}

/// Thinned spatial cutout of `input` written to `output`
pub fn subset_to_path(input: &Path, output: &Path, grid_spec: &Path) -> Result<()> {
    let spec = GridSpec::from_path(grid_spec)?;
    let reader = GridReader::open(input)?;
    let grids = reader.read_all()?;
    let Some(first) = grids.first() else {
        return Ok(());
    };
    let lat_lon = is_lat_lon(first)?;
    let cutouts = grids
        .iter()
        .map(|g| subset_grid(g, &spec, lat_lon))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let cutout = &cutouts[0];

    let mut metadata = cutout.metadata.clone();
    metadata.extend(provenance_fields());
    if cutouts.len() == 1 {
        let mut single = cutout.clone();
        single.metadata = metadata;
        write_grid(output, &single)?;
    } else {
        write_grids(output, &cutouts, cutout.geotransform, &cutout.projection, &metadata)?;
    }
    Ok(())
}

/// Field metadata from a JSON description (`.json`) or read from a
/// netCDF file through GDAL
pub fn read_cube_metadata(path: &Path) -> Result<CubeMetadata> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        return Ok(CubeMetadata::from_path(path)?);
    }
    let reader = GridReader::open_field(path)?;
    let band = reader.band_metadata(1)?;
    Ok(CubeMetadata::from_netcdf_items(&reader.metadata.metadata, &band)?)
}

/// Readable interpretation of a field's metadata
pub fn interpret_metadata(path: &Path, verbose: bool) -> Result<String> {
    let cube = read_cube_metadata(path)?;
    let interp = MetadataInterpreter::new().run(&cube)?;
    Ok(display_interpretation(&interp, verbose))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    #[test]
    fn times_from_grid_metadata() {
        let mut grid = Grid::from_array(array![[0.0]]);
        grid.metadata.insert("NETCDF_DIM_time".into(), "1590969600".into());
        grid.metadata.insert("forecast_period".into(), "2700".into());
        let validity = grid_validity_time(&grid).unwrap();
        assert_eq!(validity, Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(grid_lead_time(&grid, validity), Some(45));

        grid.metadata.remove("forecast_period");
        grid.metadata
            .insert("forecast_reference_time".into(), "1590962400".into());
        assert_eq!(grid_lead_time(&grid, validity), Some(120));
    }

    #[test]
    fn files_grouped_by_model() {
        let groups = group_by_model(&[
            "logs/202006_UKV_counts.log",
            "logs/202007_UKV_counts.log",
            "logs/202006_nowcast_counts.log",
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["UKV"].len(), 2);
    }

    #[test]
    fn bad_time_argument_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = daynight_mask_to_path(
            &dir.path().join("ref.tif"),
            &dir.path().join("out.tif"),
            &["2020-06-01".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "time", .. }));
    }

    #[test]
    fn stats_window_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("202006_UKV_counts.log");
        std::fs::write(
            &path,
            "20200601T0100Z  60  0.03     50     25     25    900\n\
             20200602T0100Z  60  0.03     10      0      0     90\n",
        )
        .unwrap();
        let window = DateWindow {
            startdate: 20200601,
            enddate: 20200603,
        };
        let tables = stats_by_model(&[&path], window).unwrap();
        let (_, csi) = tables["UKV"].trend_with_leadtime(0.03, crate::types::Stat::Csi);
        assert_eq!(csi, vec![1.0]);
    }
}
