use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, ColorChoice, Parser, Subcommand};

use crate::types::{CrossoverThreshold, RegimeSubset, Stat};

/// Dispatcher: `improver [--log] TOOL [ARGS]...`
#[derive(Parser, Debug)]
#[command(
    name = "improver",
    version,
    about = "IMPROVER post-processing tools",
    after_help = "Tools:\n  aggregate-counts, daynight-mask, interpret-metadata, skill-crossover,\n  subset-refrun-data, verify-stats, wind-downscaling\n\nRun `improver TOOL -h` for the arguments of a tool."
)]
pub struct CliArgs {
    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: ToolCommand,
}

#[derive(Subcommand, Debug)]
pub enum ToolCommand {
    /// Tool name followed by its own arguments, parsed by the tool
    #[command(external_subcommand)]
    Tool(Vec<OsString>),
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-wind-downscaling",
    about = "Run wind downscaling to apply roughness correction and height correction to wind fields.",
    disable_help_flag = true,
    allow_negative_numbers = true,
    color = ColorChoice::Never
)]
pub struct WindDownscalingArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// Location of file containing height levels coordinates. Without this, heights of the input wind speed are used
    #[arg(long = "height_levels_filepath", value_name = "HEIGHT_LEVELS_FILE")]
    pub height_levels_filepath: Option<PathBuf>,

    /// Location of vegetative roughness length file. Without this, no vegetative roughness correction is applied
    #[arg(long = "veg_roughness_filepath", value_name = "VEGETATIVE_ROUGHNESS_LENGTH_FILE")]
    pub veg_roughness_filepath: Option<PathBuf>,

    /// Location of the wind speed on standard grid file
    #[arg(value_name = "WIND_SPEED_FILE")]
    pub wind_speed_filepath: PathBuf,

    /// Location of model silhouette roughness file
    #[arg(value_name = "AOS_FILE")]
    pub aos_filepath: PathBuf,

    /// Location of standard deviation of model orography height file
    #[arg(value_name = "SIGMA_FILE")]
    pub sigma_filepath: PathBuf,

    /// Location of target orography file to downscale fields to
    #[arg(value_name = "TARGET_OROGRAPHY_FILE")]
    pub target_orography_filepath: PathBuf,

    /// Location of orography on standard grid file (interpolated model orography)
    #[arg(value_name = "STANDARD_OROGRAPHY_FILE")]
    pub standard_orography_filepath: PathBuf,

    /// Original resolution of model orography (before interpolation to standard grid) in metres
    #[arg(value_name = "MODEL_RESOLUTION")]
    pub model_resolution: f64,

    /// The output path for the processed NetCDF
    #[arg(value_name = "OUTPUT_FILE")]
    pub output_filepath: PathBuf,
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-daynight-mask",
    about = "Calculate a day (1) / night (0) mask on the grid of a reference field for each validity time.",
    disable_help_flag = true,
    color = ColorChoice::Never
)]
pub struct DaynightMaskArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// Validity time as YYYYMMDDTHHMMZ; repeat for several times
    #[arg(long = "time", value_name = "TIME", required = true)]
    pub time: Vec<String>,

    /// File whose grid the mask is calculated on
    #[arg(value_name = "REFERENCE_FILE")]
    pub reference_filepath: PathBuf,

    /// Output mask file (netCDF for .nc, GeoTIFF otherwise)
    #[arg(value_name = "OUTPUT_FILE")]
    pub output_filepath: PathBuf,
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-aggregate-counts",
    about = "Calculate hits, misses, false alarms and no detections and append counts to a log file.",
    disable_help_flag = true,
    color = ColorChoice::Never
)]
pub struct AggregateCountsArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// Directory to write / append log file
    #[arg(long = "log_path", value_name = "LOG_PATH", required = true)]
    pub log_path: PathBuf,

    /// Source model identifier for output file name
    #[arg(long = "model", value_name = "MODEL", required = true)]
    pub model: String,

    /// Comma-separated rain rate thresholds in mm/h
    #[arg(long = "thresholds_mmh", value_name = "THRESHOLDS_MMH", required = true, value_delimiter = ',')]
    pub thresholds_mmh: Vec<f64>,

    /// Observation time as YYYYMMDDTHHMMZ, overriding the time on the file
    #[arg(long = "cycletime", value_name = "CYCLETIME")]
    pub cycletime: Option<String>,

    /// Observation field
    #[arg(value_name = "OBS_FILE")]
    pub obs_filepath: PathBuf,

    /// Forecast fields (nowcast or UKV)
    #[arg(value_name = "FCST_FILES", required = true)]
    pub fcst_filepaths: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-verify-stats",
    about = "Tabulate skill statistics with lead time from counts log files.",
    disable_help_flag = true,
    color = ColorChoice::Never
)]
pub struct VerifyStatsArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// Comma-separated statistics (POD, FAR, CSI, HSS)
    #[arg(
        long = "stats",
        value_name = "STATS",
        value_enum,
        ignore_case = true,
        value_delimiter = ',',
        default_value = "HSS,CSI"
    )]
    pub stats: Vec<Stat>,

    /// Comma-separated thresholds in mm/h
    #[arg(
        long = "thresholds",
        value_name = "THRESHOLDS",
        value_delimiter = ',',
        default_value = "0.03,0.1,0.5,1.0,2.0,4.0"
    )]
    pub thresholds: Vec<f64>,

    /// Comma-separated lead times in minutes; tabulate against threshold for these instead
    #[arg(long = "leadtimes", value_name = "LEADTIMES", value_delimiter = ',')]
    pub leadtimes: Vec<i64>,

    /// Exclude lines dated on or before YYYYMMDD
    #[arg(long = "startdate", value_name = "STARTDATE")]
    pub startdate: Option<u32>,

    /// Exclude lines dated on or after YYYYMMDD
    #[arg(long = "enddate", value_name = "ENDDATE")]
    pub enddate: Option<u32>,

    /// Write JSON instead of text tables
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,

    /// List of textfiles to read
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-skill-crossover",
    about = "Find the lead time at which nowcast skill drops below the UKV.",
    disable_help_flag = true,
    color = ColorChoice::Never
)]
pub struct SkillCrossoverArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// Textfile containing regimes by date
    #[arg(long = "regimes", value_name = "REGIMES")]
    pub regimes: Option<PathBuf>,

    /// Only keep days in good or bad regimes
    #[arg(long = "subset", value_name = "SUBSET", value_enum)]
    pub subset: Option<RegimeSubset>,

    /// Rain rate threshold: zero (0.03 mm/h) or one (1 mm/h)
    #[arg(long = "threshold", value_name = "THRESHOLD", value_enum, default_value_t = CrossoverThreshold::Zero)]
    pub threshold: CrossoverThreshold,

    /// First day to include, YYYYMMDD
    #[arg(long = "startdate", value_name = "STARTDATE")]
    pub startdate: Option<u32>,

    /// Last day to include, YYYYMMDD
    #[arg(long = "enddate", value_name = "ENDDATE")]
    pub enddate: Option<u32>,

    /// Write JSON instead of a text table
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,

    /// List of textfiles containing counts
    #[arg(value_name = "COUNTFILES", required = true)]
    pub countfiles: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-subset-refrun-data",
    about = "Extract a thinned spatial cutout of input file data.",
    disable_help_flag = true,
    color = ColorChoice::Never
)]
pub struct SubsetArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// JSON file of coordinate bounds and thinning factors
    #[arg(long = "grid_spec", value_name = "GRID_SPEC", required = true)]
    pub grid_spec: PathBuf,

    /// Input dataset
    #[arg(value_name = "INPUT_FILE")]
    pub input_filepath: PathBuf,

    /// Output cutout
    #[arg(value_name = "OUTPUT_FILE")]
    pub output_filepath: PathBuf,
}

#[derive(Parser, Debug)]
#[command(
    name = "improver-interpret-metadata",
    about = "Interpret metadata",
    disable_help_flag = true,
    color = ColorChoice::Never
)]
pub struct InterpretMetadataArgs {
    #[arg(short = 'h', long = "help", action = ArgAction::Help, help = "show this help message and exit")]
    pub help: Option<bool>,

    /// Show where each statement comes from
    #[arg(long = "verbose", default_value_t = false)]
    pub verbose: bool,

    /// Metadata to interpret: a JSON description, or a netCDF/GDAL file read directly
    #[arg(value_name = "FILEPATH")]
    pub filepath: PathBuf,
}
