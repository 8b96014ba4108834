use std::ffi::OsString;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::api;
use crate::core::downscaling::DownscalingPaths;
use crate::core::params::{DateWindow, DownscalingParams};

use super::args::{
    AggregateCountsArgs, CliArgs, DaynightMaskArgs, InterpretMetadataArgs, SkillCrossoverArgs,
    SubsetArgs, ToolCommand, VerifyStatsArgs, WindDownscalingArgs,
};
use super::errors::AppError;
use super::report;
use super::usage::{error_message, format_usage, help_text, text_width, usage_banner};

/// Tool names accepted by the dispatcher, sorted
pub const TOOLS: [&str; 7] = [
    "aggregate-counts",
    "daynight-mask",
    "interpret-metadata",
    "skill-crossover",
    "subset-refrun-data",
    "verify-stats",
    "wind-downscaling",
];

/// Debug output on stderr with `debug`, otherwise `RUST_LOG` (default warn)
pub fn init_logging(debug: bool) {
    let result = if debug {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .try_init()
    };
    // A subscriber may already be installed when embedded
    let _ = result;
}

pub fn run(args: CliArgs) -> ExitCode {
    init_logging(args.log);
    let ToolCommand::Tool(mut argv) = args.command;
    if argv.is_empty() {
        return unknown_tool("").report();
    }
    let name = argv.remove(0);
    run_tool(&name.to_string_lossy(), argv)
}

/// Run one tool with its own arguments (program name excluded)
pub fn run_tool<I>(name: &str, args: I) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
{
    debug!("Dispatching to {}", name);
    let outcome = match name {
        "wind-downscaling" => dispatch(args, wind_downscaling),
        "daynight-mask" => dispatch(args, daynight_mask),
        "aggregate-counts" => dispatch(args, aggregate_counts),
        "verify-stats" => dispatch(args, verify_stats),
        "skill-crossover" => dispatch(args, skill_crossover),
        "subset-refrun-data" => dispatch(args, subset_refrun_data),
        "interpret-metadata" => dispatch(args, interpret_metadata),
        other => Err(unknown_tool(other)),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => err.report(),
    }
}

fn unknown_tool(name: &str) -> AppError {
    let choices = format!("{{{}}}", TOOLS.join(","));
    let optionals = ["[-h]".to_string(), "[--log]".to_string()];
    let positionals = [choices.clone(), "...".to_string()];
    AppError::Usage {
        prog: "improver".to_string(),
        usage: format_usage("improver", &optionals, &positionals, text_width()),
        message: format!(
            "argument TOOL: invalid choice: '{}' (choose from {})",
            name,
            TOOLS.map(|t| format!("'{}'", t)).join(", ")
        ),
    }
}

fn dispatch<P, I>(args: I, tool: fn(P) -> crate::Result<()>) -> Result<(), AppError>
where
    P: Parser,
    I: IntoIterator<Item = OsString>,
{
    let cmd = P::command();
    let prog = cmd.get_name().to_string();
    let argv = std::iter::once(OsString::from(&prog)).chain(args);
    let width = text_width();
    let parsed = P::try_parse_from(argv).map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp => AppError::Help(help_text(&cmd, width)),
        _ => AppError::Usage {
            prog: prog.clone(),
            usage: usage_banner(&cmd, width),
            message: error_message(&err),
        },
    })?;
    tool(parsed).map_err(|source| AppError::Runtime { prog, source })
}

fn wind_downscaling(args: WindDownscalingArgs) -> crate::Result<()> {
    let paths = DownscalingPaths {
        wind_speed: args.wind_speed_filepath,
        aos: args.aos_filepath,
        sigma: args.sigma_filepath,
        target_orography: args.target_orography_filepath,
        standard_orography: args.standard_orography_filepath,
    };
    let params = DownscalingParams {
        model_resolution: args.model_resolution,
        height_levels: args.height_levels_filepath,
        veg_roughness: args.veg_roughness_filepath,
    };
    api::downscale_wind_to_path(&paths, &params, &args.output_filepath)
}

fn daynight_mask(args: DaynightMaskArgs) -> crate::Result<()> {
    let bands = api::daynight_mask_to_path(&args.reference_filepath, &args.output_filepath, &args.time)?;
    info!("Wrote {} mask(s) to {:?}", bands, args.output_filepath);
    Ok(())
}

fn aggregate_counts(args: AggregateCountsArgs) -> crate::Result<()> {
    let log_path = api::aggregate_counts(
        &args.obs_filepath,
        &args.fcst_filepaths,
        &args.log_path,
        &args.model,
        &args.thresholds_mmh,
        args.cycletime.as_deref(),
    )?;
    info!("Counts appended to {:?}", log_path);
    Ok(())
}

fn verify_stats(args: VerifyStatsArgs) -> crate::Result<()> {
    let window = DateWindow {
        startdate: args.startdate.unwrap_or(DateWindow::UNBOUNDED.startdate),
        enddate: args.enddate.unwrap_or(DateWindow::UNBOUNDED.enddate),
    };
    let tables = api::stats_by_model(&args.files, window)?;
    let by_threshold = !args.leadtimes.is_empty();
    let text = match (args.json, by_threshold) {
        (true, false) => report::stats_json(&tables, &args.stats, &args.thresholds)
            .map_err(|e| crate::Error::Io(e.into()))?,
        (true, true) => report::threshold_json(&tables, &args.stats, &args.leadtimes)
            .map_err(|e| crate::Error::Io(e.into()))?,
        (false, false) => report::stats_text(&tables, &args.stats, &args.thresholds),
        (false, true) => report::threshold_text(&tables, &args.stats, &args.leadtimes),
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn skill_crossover(args: SkillCrossoverArgs) -> crate::Result<()> {
    let defaults = DateWindow::default();
    let window = DateWindow {
        startdate: args.startdate.unwrap_or(defaults.startdate),
        enddate: args.enddate.unwrap_or(defaults.enddate),
    };
    let rows = api::skill_crossovers(
        &args.countfiles,
        window,
        args.threshold,
        args.regimes.as_deref(),
        args.subset,
    )?;
    let text = if args.json {
        report::crossover_json(&rows).map_err(|e| crate::Error::Io(e.into()))?
    } else {
        report::crossover_text(&rows)
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn subset_refrun_data(args: SubsetArgs) -> crate::Result<()> {
    api::subset_to_path(&args.input_filepath, &args.output_filepath, &args.grid_spec)?;
    info!("Cutout written to {:?}", args.output_filepath);
    Ok(())
}

fn interpret_metadata(args: InterpretMetadataArgs) -> crate::Result<()> {
    let text = api::interpret_metadata(&args.filepath, args.verbose)?;
    println!("{}", text.trim_end());
    Ok(())
}
