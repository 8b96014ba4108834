#![doc = r#"
IMPROVER — post-processing command-line tools for gridded weather forecasts.

This crate provides a typed API behind the `improver` command-line tools: loading
and validating wind downscaling inputs, day/night masks from solar elevation,
thinned spatial cutouts of reference-run data, readable interpretations of
forecast metadata, and precipitation verification (contingency counts, skill
statistics and nowcast/NWP skill crossovers).

Stability
---------
The public library API is experimental in initial releases and may evolve as the
crate stabilizes. Breaking changes can occur.

Requirements
------------
- GDAL development headers and runtime (with the netCDF driver) on your system.
- Rust 2024 edition toolchain.

Add dependency
--------------
```toml
[dependencies]
improver = "0.1"
```

Quick start: skill statistics from counts logs
----------------------------------------------
```rust,no_run
use improver::{DateWindow, Stat, stats_by_model};

fn main() -> improver::Result<()> {
    let files = ["logs/202006_UKV_counts.log", "logs/202006_nowcast_counts.log"];
    for (model, table) in stats_by_model(&files, DateWindow::UNBOUNDED)? {
        let (leadtimes, csi) = table.trend_with_leadtime(0.03, Stat::Csi);
        println!("{model}: {leadtimes:?} {csi:?}");
    }
    Ok(())
}
```

Day/night mask on the grid of a reference field
------------------------------------------------
```rust,no_run
use std::path::Path;

fn main() -> improver::Result<()> {
    let bands = improver::daynight_mask_to_path(
        Path::new("/data/orography.nc"),
        Path::new("/out/mask.nc"),
        &["20200601T1200Z".to_string()],
    )?;
    println!("wrote {bands} mask(s)");
    Ok(())
}
```

Error handling
--------------
All public functions return `improver::Result<T>`; match on `improver::Error` to handle
specific cases, e.g. grid I/O or verification errors.

```rust,no_run
use std::path::Path;
use improver::{Error, interpret_metadata};

fn main() {
    match interpret_metadata(Path::new("/data/cube.json"), false) {
        Ok(text) => println!("{text}"),
        Err(Error::Metadata(e)) => eprintln!("Metadata error: {e}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — high-level entry points, one per command-line tool.
- [`verify`] — contingency counts, skill statistics, crossovers and regimes.
- [`core`] — solar geometry, subsetting, metadata interpretation, downscaling inputs.
- [`io`] — GDAL-backed grid reader and GeoTIFF/netCDF writers.
- [`cli`] — argument parsing and dispatch shared by the binaries.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod io;
pub mod types;
pub mod verify;

// Curated public API surface
// Types
pub use core::params::{DateWindow, DownscalingParams};
pub use error::{Error, Result};
pub use types::{CrossoverThreshold, RegimeSubset, Stat};

// Readers and writers
pub use io::{Grid, GridError, GridReader, read_first_grid};
pub use io::writers::{write_grid, write_grids};

// High-level API re-exports
pub use api::{
    CrossoverRow, aggregate_counts, daynight_mask_to_path, downscale_wind_to_path,
    interpret_metadata, skill_crossovers, stats_by_model, subset_to_path,
};
