//! Relative position of the sun and the day/night mask derived from it.
//!
//! All formulas are the NOAA Earth System Research Lab low accuracy
//! equations. Angles are in degrees at the API boundary.
use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::{Array, Array2, ArrayView, Dimension, Zip};
use thiserror::Error;
use tracing::debug;

use crate::io::gdal::{GridError, grid_lat_lon, is_lat_lon};
use crate::io::grid::Grid;

#[derive(Debug, Error)]
pub enum SolarError {
    #[error("Longitudes must be between -180.0 and 180.0")]
    LongitudeRange,
    #[error("Latitudes must be between -90.0 and 90.0")]
    LatitudeRange,
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

fn check_range<D: Dimension>(values: &ArrayView<'_, f64, D>, limit: f64) -> bool {
    values.iter().all(|v| (-limit..=limit).contains(v))
}

/// Declination in degrees North-South for a 0-based day of the year
/// (0 = 1st January).
pub fn solar_declination(day_of_year: u32) -> f64 {
    // -(axial_tilt) * cos(360/orbital_year * day_of_year - solstice_offset)
    -23.5 * (0.9856 * day_of_year as f64 + 9.3).to_radians().cos()
}

/// Hour angle in degrees East-West for each longitude.
pub fn solar_hour_angle<D: Dimension>(
    longitudes: ArrayView<'_, f64, D>,
    day_of_year: u32,
    utc_hour: f64,
) -> Result<Array<f64, D>, SolarError> {
    if !check_range(&longitudes, 180.0) {
        return Err(SolarError::LongitudeRange);
    }
    let thetao = 2.0 * PI * day_of_year as f64 / 365.0;
    let eqt = 0.000075 + 0.001868 * thetao.cos()
        - 0.032077 * thetao.sin()
        - 0.014615 * (2.0 * thetao).cos()
        - 0.040849 * (2.0 * thetao).sin();

    Ok(longitudes.mapv(|lon| {
        // Longitudinal correction from the Greenwich meridian
        let lon_correction = 24.0 * lon / 360.0;
        let solar_time = utc_hour + lon_correction + eqt * 12.0 / PI;
        (solar_time - 12.0) * 15.0
    }))
}

/// Solar elevation in degrees for paired latitudes and longitudes.
pub fn solar_elevation<D: Dimension>(
    latitudes: ArrayView<'_, f64, D>,
    longitudes: ArrayView<'_, f64, D>,
    day_of_year: u32,
    utc_hour: f64,
) -> Result<Array<f64, D>, SolarError> {
    if !check_range(&longitudes, 180.0) {
        return Err(SolarError::LongitudeRange);
    }
    if !check_range(&latitudes, 90.0) {
        return Err(SolarError::LatitudeRange);
    }
    let decl = solar_declination(day_of_year).to_radians();
    let hour_angle = solar_hour_angle(longitudes, day_of_year, utc_hour)?;

    Ok(Zip::from(&latitudes)
        .and(&hour_angle)
        .par_map_collect(|&lat, &hour| {
            let lat = lat.to_radians();
            let hour = hour.to_radians();
            (decl.sin() * lat.sin() + decl.cos() * lat.cos() * hour.cos())
                .asin()
                .to_degrees()
        }))
}

/// Latitude of the day/night terminator at each longitude.
pub fn daynight_terminator<D: Dimension>(
    longitudes: ArrayView<'_, f64, D>,
    day_of_year: u32,
    utc_hour: f64,
) -> Result<Array<f64, D>, SolarError> {
    let decl = solar_declination(day_of_year).to_radians();
    let hour_angle = solar_hour_angle(longitudes, day_of_year, utc_hour)?;
    Ok(hour_angle.mapv(|h| (-h.to_radians().cos() / decl.tan()).atan().to_degrees()))
}

/// 0-based day of year and fractional UTC hour of a validity time
pub fn day_and_hour(time: &DateTime<Utc>) -> (u32, f64) {
    let utc_hour = (time.hour() as f64 * 60.0 + time.minute() as f64) / 60.0;
    (time.ordinal0(), utc_hour)
}

/// Generates day (1) / night (0) masks on the grid of a reference field
#[derive(Debug, Clone, Copy)]
pub struct DayNightMask {
    pub day: f64,
    pub night: f64,
}

impl Default for DayNightMask {
    fn default() -> Self {
        Self { day: 1.0, night: 0.0 }
    }
}

impl std::fmt::Display for DayNightMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<DayNightMask : Day = {}, Night = {}>", self.day, self.night)
    }
}

impl DayNightMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask for a regular latitude/longitude grid, using the terminator.
    /// `lats` index rows and `lons` index columns.
    pub fn mask_lat_lon(
        &self,
        lats: &[f64],
        lons: &[f64],
        day_of_year: u32,
        utc_hour: f64,
    ) -> Result<Array2<f64>, SolarError> {
        let terminator =
            daynight_terminator(ArrayView::from(lons), day_of_year, utc_hour)?;
        let northern_summer = solar_declination(day_of_year) > 0.0;
        let mut mask = Array2::from_elem((lats.len(), lons.len()), self.night);
        for ((row, col), cell) in mask.indexed_iter_mut() {
            let lat = lats[row];
            let term = terminator[col];
            let is_day = if northern_summer { lat >= term } else { lat < term };
            if is_day {
                *cell = self.day;
            }
        }
        Ok(mask)
    }

    /// Mask for arbitrary per-cell coordinates, day where the sun is above
    /// the horizon.
    pub fn mask_from_elevation(
        &self,
        lats: &Array2<f64>,
        lons: &Array2<f64>,
        day_of_year: u32,
        utc_hour: f64,
    ) -> Result<Array2<f64>, SolarError> {
        let elevation = solar_elevation(lats.view(), lons.view(), day_of_year, utc_hour)?;
        Ok(elevation.mapv(|el| if el > 0.0 { self.day } else { self.night }))
    }

    /// One mask band per validity time, on the grid of `reference`.
    pub fn process(
        &self,
        reference: &Grid,
        times: &[DateTime<Utc>],
    ) -> Result<Vec<Grid>, SolarError> {
        let lat_lon_grid = is_lat_lon(reference)?;
        let coords = if lat_lon_grid {
            None
        } else {
            Some(grid_lat_lon(reference)?)
        };

        let mut masks = Vec::with_capacity(times.len());
        for time in times {
            let (day_of_year, utc_hour) = day_and_hour(time);
            debug!(
                "Day/night mask for {} (day {}, hour {:.2})",
                time, day_of_year, utc_hour
            );
            let data = match &coords {
                None => self.mask_lat_lon(
                    &reference.y_points(),
                    &reference.x_points(),
                    day_of_year,
                    utc_hour,
                )?,
                Some((lats, lons)) => {
                    self.mask_from_elevation(lats, lons, day_of_year, utc_hour)?
                }
            };
            let mut mask = Grid::from_array(data);
            mask.geotransform = reference.geotransform;
            mask.projection = reference.projection.clone();
            mask.units = "1".to_string();
            mask.name = "day_night_mask".to_string();
            mask.metadata.insert("long_name".to_string(), "day_night_mask".to_string());
            mask.metadata.insert("units".to_string(), "1".to_string());
            mask.metadata.insert("time".to_string(), time.timestamp().to_string());
            masks.push(mask);
        }
        Ok(masks)
    }
}
