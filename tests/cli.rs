use assert_cmd::{assert::Assert, prelude::*};
use improver::{Grid, GridReader, write_grid};
use ndarray::{Array2, array};
use predicates::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;

const WIND_BANNER: &str = "usage: improver-wind-downscaling [-h]
                                 [--height_levels_filepath HEIGHT_LEVELS_FILE]
                                 [--veg_roughness_filepath VEGETATIVE_ROUGHNESS_LENGTH_FILE]
                                 WIND_SPEED_FILE AOS_FILE SIGMA_FILE
                                 TARGET_OROGRAPHY_FILE STANDARD_OROGRAPHY_FILE
                                 MODEL_RESOLUTION OUTPUT_FILE";

fn improver() -> Command {
    let mut cmd = Command::cargo_bin("improver").unwrap();
    cmd.env("COLUMNS", "80");
    cmd
}

fn tool(args: &[&str]) -> Assert {
    improver().args(args).assert()
}

#[test]
fn wind_downscaling_without_arguments_prints_usage() {
    tool(&["wind-downscaling"])
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::starts_with(WIND_BANNER))
        .stderr(predicate::str::contains(
            "improver-wind-downscaling: error: the following arguments are required: \
             WIND_SPEED_FILE, AOS_FILE, SIGMA_FILE, TARGET_OROGRAPHY_FILE, \
             STANDARD_OROGRAPHY_FILE, MODEL_RESOLUTION, OUTPUT_FILE",
        ));
}

#[test]
fn standalone_wind_downscaling_binary_matches() {
    Command::cargo_bin("improver-wind-downscaling")
        .unwrap()
        .env("COLUMNS", "80")
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with(WIND_BANNER));
}

#[test]
fn wind_downscaling_help_goes_to_stdout() {
    tool(&["wind-downscaling", "-h"])
        .success()
        .stdout(predicate::str::starts_with(WIND_BANNER))
        .stdout(predicate::str::contains("positional arguments:"))
        .stdout(predicate::str::contains("optional arguments:"));
}

#[test]
fn bad_model_resolution_is_a_usage_error() {
    tool(&["wind-downscaling", "a", "b", "c", "d", "e", "fine", "out.nc"])
        .code(2)
        .stderr(predicate::str::contains("improver-wind-downscaling: error: "));
}

#[test]
fn unknown_tool_is_rejected() {
    tool(&["no-such-tool"])
        .code(2)
        .stderr(predicate::str::contains(
            "improver: error: argument TOOL: invalid choice: 'no-such-tool'",
        ));
}

fn write_ukv_counts(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("202006_UKV_counts.log");
    fs::write(
        &path,
        "20200601T0100Z  60  0.03     50     25     25    900\n\
         20200601T0100Z  60     1     10     10     20    960\n\
         20200601T0200Z 120  0.03     40     35     25    900\n",
    )
    .unwrap();
    path
}

#[test]
fn verify_stats_text_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ukv_counts(dir.path());
    improver()
        .args(["verify-stats", "--stats", "CSI", "--thresholds", "0.03,1"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("UKV CSI"))
        .stdout(predicate::str::contains("threshold     60    120"))
        .stdout(predicate::str::contains("     0.03  0.500  0.400"))
        .stdout(predicate::str::contains("        1  0.250      -"));
}

#[test]
fn verify_stats_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ukv_counts(dir.path());
    let output = improver()
        .args(["verify-stats", "--json"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["UKV"]["CSI"]["0.03"]["60"], serde_json::json!(0.5));
    assert!(value["UKV"]["HSS"].is_object());
}

fn counts_line(out: &mut String, cycle_hour: u32, lead: i64, thresh: &str, counts: [u64; 4]) {
    let minutes = cycle_hour as i64 * 60 + lead;
    let (day, rem) = (1 + minutes / 1440, minutes % 1440);
    writeln!(
        out,
        "202006{:02}T{:02}{:02}Z {:3} {:>5} {:6} {:6} {:6} {:6}",
        day,
        rem / 60,
        rem % 60,
        lead,
        thresh,
        counts[0],
        counts[1],
        counts[2],
        counts[3]
    )
    .unwrap();
}

#[test]
fn skill_crossover_finds_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut nowcast = String::new();
    for k in 1..=24u64 {
        // CSI falls from 0.96 by 0.04 per 15 minutes
        counts_line(&mut nowcast, 0, 15 * k as i64, "0.03", [100 - 4 * k, 4 * k, 0, 900]);
    }
    let mut ukv = String::new();
    for h in 1..=6 {
        counts_line(&mut ukv, 0, 60 * h, "0.03", [50, 50, 0, 900]);
    }
    let nowcast_path = dir.path().join("202006_nowcast_counts.log");
    let ukv_path = dir.path().join("202006_UKV_counts.log");
    fs::write(&nowcast_path, nowcast).unwrap();
    fs::write(&ukv_path, ukv).unwrap();

    improver()
        .arg("skill-crossover")
        .arg(&nowcast_path)
        .arg(&ukv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("20200601T0000Z"));
}

#[test]
fn skill_crossover_without_nowcast_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ukv_counts(dir.path());
    improver()
        .arg("skill-crossover")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "improver-skill-crossover: error: No nowcast model found",
        ));
}

#[test]
fn interpret_metadata_describes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gusts.json");
    fs::write(
        &path,
        r#"{
            "name": "wind_gust",
            "units": "m s-1",
            "coords": [
                {"name": "time"},
                {"name": "forecast_period"},
                {"name": "forecast_reference_time"},
                {"name": "percentile", "units": "%", "is_dim": true}
            ],
            "attributes": {
                "source": "Met Office Unified Model",
                "title": "MOGREPS-UK Model Forecast on 2 km Standard Grid",
                "institution": "Met Office",
                "mosg__model_configuration": "uk_ens",
                "wind_gust_diagnostic": "Typical gusts"
            }
        }"#,
    )
    .unwrap();
    improver()
        .arg("interpret-metadata")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("This is a gridded percentiles file"))
        .stdout(predicate::str::contains("It contains data from MOGREPS-UK"));
}

#[test]
fn interpret_metadata_missing_file_is_a_runtime_error() {
    tool(&["interpret-metadata", "/nonexistent/cube.json"])
        .code(1)
        .stderr(predicate::str::starts_with("improver-interpret-metadata: error: "));
}

#[test]
fn usage_wraps_to_columns() {
    improver()
        .env("COLUMNS", "300")
        .arg("wind-downscaling")
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with(
            "usage: improver-wind-downscaling [-h] [--height_levels_filepath HEIGHT_LEVELS_FILE] \
             [--veg_roughness_filepath VEGETATIVE_ROUGHNESS_LENGTH_FILE] WIND_SPEED_FILE",
        ));
}

#[test]
fn verify_stats_by_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_ukv_counts(dir.path());
    improver()
        .args(["verify-stats", "--stats", "CSI", "--leadtimes", "60,120"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(" leadtime   0.03      1"))
        .stdout(predicate::str::contains("       60  0.500  0.250"))
        .stdout(predicate::str::contains("      120  0.400      -"));
}

// 1-degree cells over southern England
fn write_field(path: &Path, data: Array2<f64>, metadata: &[(&str, &str)]) {
    let mut grid = Grid::from_array(data);
    grid.geotransform = [-2.0, 1.0, 0.0, 52.0, 0.0, -1.0];
    grid.projection = "EPSG:4326".to_string();
    for (key, value) in metadata {
        grid.metadata.insert(key.to_string(), value.to_string());
    }
    write_grid(path, &grid).unwrap();
}

#[test]
fn daynight_mask_writes_a_band_per_time() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("orography.tif");
    let output = dir.path().join("mask.tif");
    write_field(&reference, Array2::zeros((2, 3)), &[]);

    improver()
        .args(["daynight-mask", "--time", "20200601T1200Z", "--time", "20200601T0000Z"])
        .arg(&reference)
        .arg(&output)
        .assert()
        .success();

    let masks = GridReader::open(&output).unwrap().read_all().unwrap();
    assert_eq!(masks.len(), 2);
    assert!(masks[0].data.iter().all(|v| *v == 1.0));
    assert!(masks[1].data.iter().all(|v| *v == 0.0));
    assert_eq!(masks[0].metadata_number("time"), Some(1_591_012_800.0));
    assert_eq!(masks[1].metadata_number("time"), Some(1_590_969_600.0));
}

#[test]
fn aggregate_counts_appends_to_monthly_log() {
    let dir = tempfile::tempdir().unwrap();
    let obs = dir.path().join("obs.tif");
    let fcst = dir.path().join("nowcast_T+15.tif");
    let at_midnight = [("units", "mm h-1"), ("time", "1590969600")];
    write_field(&obs, array![[1.0, 0.0], [1.0, 0.0]], &at_midnight);
    write_field(
        &fcst,
        array![[1.0, 1.0], [0.0, 0.0]],
        &[at_midnight[0], at_midnight[1], ("forecast_period", "900")],
    );

    improver()
        .arg("aggregate-counts")
        .arg("--log_path")
        .arg(dir.path())
        .args(["--model", "nowcast", "--thresholds_mmh", "0.5"])
        .arg(&obs)
        .arg(&fcst)
        .assert()
        .success();

    let log = fs::read_to_string(dir.path().join("202006_nowcast_counts.log")).unwrap();
    assert_eq!(log, "20200601T0000Z  15   0.5      1      1      1      1\n");
}

#[test]
fn aggregate_counts_needs_an_observation_time() {
    let dir = tempfile::tempdir().unwrap();
    let obs = dir.path().join("obs.tif");
    write_field(&obs, array![[1.0]], &[("units", "mm h-1")]);
    improver()
        .arg("aggregate-counts")
        .arg("--log_path")
        .arg(dir.path())
        .args(["--model", "UKV", "--thresholds_mmh", "0.5"])
        .arg(&obs)
        .arg(&obs)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing required metadata: time on"));
}

fn downscaling_inputs(dir: &Path, sigma_rows: usize) -> Vec<std::path::PathBuf> {
    ["wind_speed", "aos", "sigma", "target_orography", "standard_orography"]
        .iter()
        .map(|name| {
            let path = dir.join(format!("{}.tif", name));
            let rows = if *name == "sigma" { sigma_rows } else { 2 };
            write_field(&path, Array2::from_elem((rows, 3), 5.0), &[]);
            path
        })
        .collect()
}

fn wind_downscaling(inputs: &[std::path::PathBuf], resolution: &str, output: &Path) -> Assert {
    improver()
        .arg("wind-downscaling")
        .args(inputs)
        .arg(resolution)
        .arg(output)
        .assert()
}

#[test]
fn wind_downscaling_validates_then_reports_missing_correction() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = downscaling_inputs(dir.path(), 2);
    let output = dir.path().join("out.nc");
    wind_downscaling(&inputs, "1500", &output)
        .code(1)
        .stderr(predicate::str::contains(
            "improver-wind-downscaling: error: orographic roughness correction is not available",
        ));
    assert!(!output.exists());
}

#[test]
fn wind_downscaling_rejects_mismatched_grids() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = downscaling_inputs(dir.path(), 3);
    wind_downscaling(&inputs, "1500", &dir.path().join("out.nc"))
        .code(1)
        .stderr(predicate::str::contains(
            "Sigma grid has shape (3, 3), expected (2, 3) to match the wind speed",
        ));
}

#[test]
fn negative_model_resolution_reaches_validation() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = downscaling_inputs(dir.path(), 2);
    wind_downscaling(&inputs, "-1500", &dir.path().join("out.nc"))
        .code(1)
        .stderr(predicate::str::contains(
            "Model resolution must be a positive number of metres, got -1500",
        ));
}

#[test]
fn subset_refrun_data_thins_lat_lon_grid() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("field.tif");
    let output = dir.path().join("cutout.tif");
    let spec = dir.path().join("grid_spec.json");
    write_field(&input, Array2::from_shape_fn((4, 4), |(r, c)| (10 * r + c) as f64), &[]);
    fs::write(
        &spec,
        r#"{"longitude": {"min": -1, "max": 2, "thin": 1},
            "latitude": {"min": 50, "max": 52, "thin": 1}}"#,
    )
    .unwrap();

    improver()
        .arg("subset-refrun-data")
        .arg("--grid_spec")
        .arg(&spec)
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let cutout = improver::read_first_grid(&output).unwrap();
    assert_eq!(cutout.shape(), (2, 3));
    assert_eq!(cutout.data[[0, 0]], 1.0);
    assert_eq!(cutout.data[[1, 2]], 13.0);
}

#[test]
fn interpret_metadata_needs_a_netcdf_variable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("field.tif");
    write_field(&path, array![[1.0]], &[]);
    improver()
        .arg("interpret-metadata")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No netCDF variable found"));
}
