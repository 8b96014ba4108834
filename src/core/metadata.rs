//! Interpretation of forecast metadata against the IMPROVER standard.
//!
//! A field's metadata is described as JSON (name, units, coordinates, cell
//! methods, attributes). The interpreter checks it for compliance and, when
//! compliant, produces a readable description of what the field contains.
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const PROB: &str = "probabilities";
pub const PERC: &str = "percentiles";
pub const DIAG: &str = "realizations";

pub const MODEL_ID_ATTR: &str = "mosg__model_configuration";

/// Model names and the codes used for them in the model ID attribute
pub const MODEL_CODES: [(&str, &str); 4] = [
    ("Nowcast", "nc_det"),
    ("MOGREPS-G", "gl_ens"),
    ("MOGREPS-UK", "uk_ens"),
    ("UKV", "uk_det"),
];

pub const EXCEPTIONS: [&str; 3] = ["weather_code", "weather_symbols", "wind_from_direction"];

pub const MANDATORY_ATTRIBUTES: [&str; 3] = ["title", "source", "institution"];
pub const FORBIDDEN_ATTRIBUTES: [&str; 3] =
    ["um_version", "source_realizations", "mosg__forecast_run_duration"];

pub const SPOT_COORDS: [&str; 5] = ["spot_index", "latitude", "longitude", "altitude", "wmo_id"];
pub const UNBLENDED_TIME_COORDS: [&str; 3] = ["time", "forecast_period", "forecast_reference_time"];
pub const BLENDED_TIME_COORDS: [&str; 2] = ["time", "blend_time"];

const COMPLIANT_METHODS: [&str; 5] = ["min", "max", "minimum", "maximum", "sum"];
const NONCOMPLIANT_METHODS: [&str; 1] = ["point"];
const NONCOMPLIANT_MEAN_COORDS: [&str; 4] = [
    "forecast_reference_time",
    "model_id",
    "model_configuration",
    "realization",
];

const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

fn diagnostic_attributes(diagnostic: &str) -> &'static [&'static str] {
    match diagnostic {
        "weather_code" | "weather_symbols" => &["weather_code", "weather_code_meaning"],
        "wind_gust" => &["wind_gust_diagnostic"],
        _ => &[],
    }
}

fn required_time_units(coord: &str) -> Option<&'static str> {
    match coord {
        "time" | "forecast_reference_time" | "blend_time" => Some(TIME_UNITS),
        "forecast_period" => Some("seconds"),
        _ => None,
    }
}

fn model_name(code: &str) -> Option<&'static str> {
    MODEL_CODES.iter().find(|(_, c)| *c == code).map(|(name, _)| *name)
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid metadata description: {0}")]
    Json(#[from] serde_json::Error),
    /// Every compliance failure found, one per line
    #[error("{0}")]
    NonCompliant(String),
    #[error("No netCDF variable found: expected NETCDF_VARNAME on the first band")]
    NoVariable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub name: String,
    #[serde(default)]
    pub var_name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub is_dim: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMethod {
    pub method: String,
    #[serde(default)]
    pub coords: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl fmt::Display for CellMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.coords.join(", "), self.method)?;
        if let Some(comment) = &self.comment {
            write!(f, " ({})", comment)?;
        }
        Ok(())
    }
}

/// Metadata of a single forecast field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CubeMetadata {
    pub name: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub coords: Vec<Coord>,
    #[serde(default)]
    pub cell_methods: Vec<CellMethod>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl CubeMetadata {
    pub fn from_json_str(text: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, MetadataError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Metadata of a netCDF field as GDAL exposes it: dataset items named
    /// `variable#attribute` (globals under `NC_GLOBAL`) plus the attributes
    /// of the field's own band.
    pub fn from_netcdf_items(
        dataset: &BTreeMap<String, String>,
        band: &BTreeMap<String, String>,
    ) -> Result<Self, MetadataError> {
        let var = band.get("NETCDF_VARNAME").ok_or(MetadataError::NoVariable)?;
        let mut var_attrs = variable_attributes(dataset, var);
        var_attrs.extend(
            band.iter()
                .filter(|(k, _)| !k.starts_with("NETCDF_"))
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let mut coords: Vec<Coord> = Vec::new();
        let push = |coords: &mut Vec<Coord>, name: &str, is_dim: bool| {
            if !coords.iter().any(|c| c.var_name.as_deref() == Some(name)) {
                coords.push(coord_from_variable(dataset, name, is_dim));
            }
        };
        let extra = dataset.get("NETCDF_DIM_EXTRA").map(String::as_str).unwrap_or("");
        for dim in extra.trim_matches(|c| c == '{' || c == '}').split(',') {
            if !dim.trim().is_empty() {
                push(&mut coords, dim.trim(), true);
            }
        }
        for (key, value) in dataset {
            if let Some(spatial) = key.strip_suffix("#standard_name") {
                if SPATIAL_STANDARD_NAMES.contains(&value.as_str()) && spatial != var.as_str() {
                    push(&mut coords, spatial, true);
                }
            }
        }
        if let Some(aux) = var_attrs.get("coordinates") {
            for name in aux.split_whitespace() {
                push(&mut coords, name, false);
            }
        }

        let cell_methods = var_attrs
            .get("cell_methods")
            .map(|text| parse_cell_methods(text))
            .unwrap_or_default();
        let name = var_attrs
            .get("standard_name")
            .or_else(|| var_attrs.get("long_name"))
            .cloned()
            .unwrap_or_else(|| var.clone());
        let units = var_attrs.get("units").cloned().unwrap_or_default();

        let mut attributes: BTreeMap<String, String> = variable_attributes(dataset, "NC_GLOBAL")
            .into_iter()
            .filter(|(k, _)| !FILE_ATTRIBUTES.contains(&k.as_str()))
            .collect();
        attributes.extend(
            var_attrs
                .into_iter()
                .filter(|(k, _)| !CF_VARIABLE_ATTRIBUTES.contains(&k.as_str()) && !k.starts_with('_')),
        );
        debug!("netCDF variable {} read as {} with {} coord(s)", var, name, coords.len());

        Ok(Self {
            name,
            units,
            coords,
            cell_methods,
            attributes,
        })
    }

    pub fn coord(&self, name: &str) -> Option<&Coord> {
        self.coords.iter().find(|c| c.name == name)
    }

    pub fn coord_names(&self) -> Vec<&str> {
        self.coords.iter().map(|c| c.name.as_str()).collect()
    }
}

// Variable attributes that describe the variable rather than the field
const CF_VARIABLE_ATTRIBUTES: [&str; 14] = [
    "standard_name",
    "long_name",
    "units",
    "cell_methods",
    "coordinates",
    "grid_mapping",
    "bounds",
    "missing_value",
    "valid_min",
    "valid_max",
    "valid_range",
    "scale_factor",
    "add_offset",
    "axis",
];
const SPATIAL_STANDARD_NAMES: [&str; 4] = [
    "projection_x_coordinate",
    "projection_y_coordinate",
    "latitude",
    "longitude",
];
// Globals that belong to the file, not the field
const FILE_ATTRIBUTES: [&str; 2] = ["Conventions", "GDAL"];

fn variable_attributes(items: &BTreeMap<String, String>, var: &str) -> BTreeMap<String, String> {
    let prefix = format!("{}#", var);
    items
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|a| (a.to_string(), v.clone())))
        .collect()
}

fn coord_from_variable(items: &BTreeMap<String, String>, var: &str, is_dim: bool) -> Coord {
    let mut attributes = variable_attributes(items, var);
    let name = attributes
        .get("standard_name")
        .or_else(|| attributes.get("long_name"))
        .cloned()
        .unwrap_or_else(|| var.to_string());
    let units = attributes.remove("units");
    attributes.retain(|k, _| !CF_VARIABLE_ATTRIBUTES.contains(&k.as_str()) && !k.starts_with('_'));
    Coord {
        name,
        var_name: Some(var.to_string()),
        units,
        attributes,
        is_dim,
    }
}

/// Cell methods from a CF `cell_methods` attribute, e.g.
/// `time: maximum (comment: of wind_speed) area: mean`
pub fn parse_cell_methods(text: &str) -> Vec<CellMethod> {
    let mut methods = Vec::new();
    let mut names = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        rest = tail.trim_start();
        if let Some(name) = token.strip_suffix(':') {
            names.push(name.to_string());
            continue;
        }
        let mut method = CellMethod {
            method: token.to_string(),
            coords: std::mem::take(&mut names),
            comment: None,
        };
        if let Some(inner) = rest.strip_prefix('(') {
            let close = inner.find(')').unwrap_or(inner.len());
            if let Some(comment) = inner[..close].trim().strip_prefix("comment:") {
                method.comment = Some(comment.trim().to_string());
            }
            rest = inner.get(close + 1..).unwrap_or("").trim_start();
        }
        methods.push(method);
    }
    methods
}

/// Diagnostic named by a probability field, e.g. `air_temperature` from
/// `probability_of_air_temperature_above_threshold`
pub fn diagnostic_from_probability_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("probability_of_")?;
    rest.strip_suffix("_above_threshold")
        .or_else(|| rest.strip_suffix("_below_threshold"))
        .or_else(|| rest.strip_suffix("_between_thresholds"))
        .filter(|d| !d.is_empty())
}

/// Threshold coordinate expected on a probability field
pub fn threshold_coord_name(name: &str) -> Option<&str> {
    let diagnostic = diagnostic_from_probability_name(name)?;
    Some(diagnostic.strip_suffix("_in_vicinity").unwrap_or(diagnostic))
}

/// What the interpreter concluded about a compliant field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Interpretation {
    pub prod_type: String,
    pub field_type: String,
    pub diagnostic: String,
    pub relative_to_threshold: Option<String>,
    pub methods: String,
    pub post_processed: String,
    pub model: Option<String>,
    pub blended: bool,
    pub blendable: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MetadataInterpreter {
    interp: Interpretation,
    errors: Vec<String>,
}

impl MetadataInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_error(&mut self, msg: String) {
        debug!("Metadata error: {}", msg);
        self.errors.push(msg);
    }

    fn add_warning(&mut self, msg: String) {
        self.interp.warnings.push(msg);
    }

    /// Check `cube` and describe it. All compliance failures are reported
    /// together.
    pub fn run(mut self, cube: &CubeMetadata) -> Result<Interpretation, MetadataError> {
        self.interp.prod_type = "gridded".into();
        let mut diagnostic_key = cube.name.clone();

        if EXCEPTIONS.contains(&cube.name.as_str()) {
            self.interp.field_type = cube.name.replace('_', " ");
            self.interp.diagnostic = self.interp.field_type.clone();
            self.check_exception_cell_methods(cube);
        } else {
            if cube.name.contains("probability") {
                self.interp.field_type = PROB.into();
                if let Some(diag) = diagnostic_from_probability_name(&cube.name) {
                    diagnostic_key = diag.to_string();
                }
                self.check_probability_metadata(cube);
            } else {
                self.interp.diagnostic = cube.name.replace('_', " ");
                self.check_field_type(cube);
            }
            if !cube.cell_methods.is_empty() {
                self.check_cell_methods(cube, &diagnostic_key);
            }
        }

        self.check_attributes(&cube.attributes, &diagnostic_key);

        let coords = cube.coord_names();
        if coords.contains(&"spot_index") {
            self.check_spot_data(cube, &coords);
        }
        if self.interp.blended {
            self.check_coords_present(&coords, &BLENDED_TIME_COORDS);
        } else {
            self.check_coords_present(&coords, &UNBLENDED_TIME_COORDS);
        }
        self.check_time_units(cube);

        if self.errors.is_empty() {
            Ok(self.interp)
        } else {
            Err(MetadataError::NonCompliant(self.errors.join("\n")))
        }
    }

    fn check_field_type(&mut self, cube: &CubeMetadata) {
        match cube.coords.iter().find(|c| c.name.contains("percentile")) {
            Some(perc) => {
                self.interp.field_type = PERC.into();
                if perc.name != "percentile" {
                    self.add_error(format!(
                        "Percentile coordinate should have name percentile, has {}",
                        perc.name
                    ));
                }
                let units = perc.units.as_deref().unwrap_or("");
                if units != "%" {
                    self.add_error(format!(
                        "Percentile coordinate should have units of %, has {}",
                        units
                    ));
                }
            }
            None => self.interp.field_type = DIAG.into(),
        }
    }

    fn check_probability_metadata(&mut self, cube: &CubeMetadata) {
        match diagnostic_from_probability_name(&cube.name) {
            Some(diag) => self.interp.diagnostic = diag.replace('_', " "),
            None => {
                self.add_error(format!(
                    "{} is not a valid probability cube name",
                    cube.name
                ));
                return;
            }
        }

        let expected = threshold_coord_name(&cube.name).unwrap_or_default();
        if let Some(coord) = cube.coord(expected) {
            self.check_threshold_coordinate(&cube.name, coord);
            return;
        }

        let msg = format!("Cube does not have expected threshold coord '{}'; ", expected);
        match cube
            .coords
            .iter()
            .find(|c| c.var_name.as_deref() == Some("threshold"))
        {
            Some(coord) => {
                self.add_error(format!(
                    "{}threshold coord has incorrect name '{}'",
                    msg, coord.name
                ));
                self.check_threshold_coordinate(&cube.name, coord);
            }
            None => self.add_error(format!(
                "no coord with var_name='threshold' found in all coords: {:?}",
                cube.coord_names()
            )),
        }
    }

    fn check_threshold_coordinate(&mut self, cube_name: &str, coord: &Coord) {
        if coord.var_name.as_deref() != Some("threshold") {
            self.add_error(format!(
                "Threshold coord {} does not have var_name='threshold'",
                coord.name
            ));
        }

        let relative = coord
            .attributes
            .get("spp__relative_to_threshold")
            .cloned()
            .unwrap_or_default();
        let direction = match relative.as_str() {
            "greater_than" | "greater_than_or_equal_to" => Some("above"),
            "less_than" | "less_than_or_equal_to" => Some("below"),
            _ => {
                self.add_error(format!(
                    "spp__relative_to_threshold attribute '{}' is not in permitted value set",
                    relative
                ));
                None
            }
        };
        self.interp.relative_to_threshold = Some(relative.replace('_', " "));

        if let Some(direction) = direction {
            if !cube_name.contains(direction) {
                self.add_error(format!(
                    "Cube name '{}' is not consistent with spp__relative_to_threshold attribute '{}'",
                    cube_name, relative
                ));
            }
        }
    }

    fn check_cell_methods(&mut self, cube: &CubeMetadata, diagnostic_key: &str) {
        for cm in &cube.cell_methods {
            let method = cm.method.as_str();
            if COMPLIANT_METHODS.contains(&method) {
                self.interp.methods += &format!(" {} over {}", method, cm.coords.join(", "));
                if self.interp.field_type == PROB {
                    let expected = format!("of {}", diagnostic_key);
                    if cm.comment.as_deref() != Some(expected.as_str()) {
                        self.add_error(format!(
                            "Cell method {} on probability data should have comment '{}'",
                            cm, expected
                        ));
                    }
                }
            } else if NONCOMPLIANT_METHODS.contains(&method)
                || (method == "mean"
                    && cm
                        .coords
                        .iter()
                        .any(|c| NONCOMPLIANT_MEAN_COORDS.contains(&c.as_str())))
            {
                self.add_error(format!("Non-standard cell method {}", cm));
            } else {
                self.add_warning(format!(
                    "Unexpected cell method {}. Please check the standard to ensure this is valid",
                    cm
                ));
            }
        }
    }

    /// Exception fields carry fixed cell methods rather than the general rules
    fn check_exception_cell_methods(&mut self, cube: &CubeMetadata) {
        if cube.cell_methods.is_empty() {
            return;
        }
        let permitted = cube.name == "wind_from_direction"
            && cube.cell_methods.len() == 1
            && cube.cell_methods[0].method == "mean"
            && cube.cell_methods[0].coords == ["realization"];
        if !permitted {
            let methods: Vec<String> = cube.cell_methods.iter().map(|cm| cm.to_string()).collect();
            self.add_error(format!("Unexpected cell methods [{}]", methods.join("; ")));
        }
    }

    fn check_attributes(&mut self, attrs: &BTreeMap<String, String>, diagnostic_key: &str) {
        let keys: Vec<&str> = attrs.keys().map(String::as_str).collect();

        if MANDATORY_ATTRIBUTES.iter().any(|a| !attrs.contains_key(*a)) {
            self.add_error(format!(
                "Cube is missing one or more of mandatory attributes: {:?}",
                MANDATORY_ATTRIBUTES
            ));
            return;
        }

        if FORBIDDEN_ATTRIBUTES.iter().any(|a| attrs.contains_key(*a)) {
            self.add_error(format!(
                "Attributes {:?} include one or more forbidden values {:?}",
                keys, FORBIDDEN_ATTRIBUTES
            ));
        }

        let required = diagnostic_attributes(diagnostic_key);
        if required.iter().any(|a| !attrs.contains_key(*a)) {
            self.add_error(format!(
                "Attributes {:?} missing one or more required values {:?}",
                keys, required
            ));
        }

        let unexpected = keys.iter().any(|k| {
            !MANDATORY_ATTRIBUTES.contains(k)
                && !FORBIDDEN_ATTRIBUTES.contains(k)
                && *k != MODEL_ID_ATTR
                && *k != "history"
                && !required.contains(k)
        });
        if unexpected {
            self.add_warning(format!(
                "{:?} include unexpected attributes. Please check the standard to ensure this is valid.",
                keys
            ));
        }

        let title = attrs.get("title").map(String::as_str).unwrap_or_default();
        let post_processed = if title.contains("Post-Processed") { "some" } else { "no" };
        self.interp.post_processed = post_processed.to_string();
        self.interp.blended = title.contains("Blend");

        let model_id = attrs.get(MODEL_ID_ATTR);
        if self.interp.blended {
            match model_id {
                None => self.add_error(format!("No {} on blended file", MODEL_ID_ATTR)),
                Some(codes) => {
                    let mut names = Vec::new();
                    for code in codes.split_whitespace() {
                        match model_name(code) {
                            Some(name) => names.push(name),
                            None => self.add_error(format!(
                                "Model ID attribute contains unrecognised model code {}",
                                code
                            )),
                        }
                    }
                    self.interp.model = Some(names.join(", "));
                }
            }
            return;
        }

        match model_id {
            Some(code) => {
                for (name, expected) in MODEL_CODES {
                    if title.contains(name) && code != expected {
                        self.add_error(format!(
                            "Title {} is inconsistent with model ID attribute {}",
                            title, code
                        ));
                    }
                }
                match model_name(code) {
                    Some(name) => self.interp.model = Some(name.to_string()),
                    None => self.add_error(format!(
                        "Model ID attribute contains unrecognised model code {}",
                        code
                    )),
                }
                self.interp.blendable = true;
            }
            None => self.interp.blendable = false,
        }
    }

    fn check_coords_present(&mut self, coords: &[&str], expected: &[&str]) {
        if expected.iter().any(|c| !coords.contains(c)) {
            self.add_error(format!("Missing one or more coordinates: {:?}", expected));
        }
    }

    fn check_spot_data(&mut self, cube: &CubeMetadata, coords: &[&str]) {
        self.interp.prod_type = "spot".into();
        self.check_coords_present(coords, &SPOT_COORDS);
        let dims: Vec<&str> = cube
            .coords
            .iter()
            .filter(|c| c.is_dim)
            .map(|c| c.name.as_str())
            .collect();
        if !dims.contains(&"spot_index") {
            self.add_error(format!("Expected spot_index dimension, got {:?}", dims));
        }
    }

    fn check_time_units(&mut self, cube: &CubeMetadata) {
        for coord in &cube.coords {
            let (Some(required), Some(units)) = (required_time_units(&coord.name), &coord.units) else {
                continue;
            };
            if units != required {
                self.add_error(format!(
                    "{} coordinate does not have required units ({} vs {})",
                    coord.name, units, required
                ));
            }
        }
    }
}

/// Readable description of an interpretation. `verbose` adds the source of
/// each statement.
pub fn display_interpretation(interp: &Interpretation, verbose: bool) -> String {
    let source = |text: &str| {
        if verbose { format!("    Source: {}\n", text) } else { String::new() }
    };

    let mut out = format!("This is a {} {} file\n", interp.prod_type, interp.field_type);
    out += &source("name, coordinates");

    if interp.field_type != interp.diagnostic {
        let rtt = match (&interp.relative_to_threshold, interp.field_type == PROB) {
            (Some(rtt), true) => format!(" {} thresholds", rtt),
            _ => String::new(),
        };
        out += &format!("It contains {} of {}{}\n", interp.field_type, interp.diagnostic, rtt);
        out += &source("name, threshold coordinate (if probability)");

        if !interp.methods.is_empty() {
            out += &format!(
                "These {} are of {}{}\n",
                interp.field_type, interp.diagnostic, interp.methods
            );
            out += &source("cell methods");
        }
    }

    out += &format!(
        "It has undergone {} significant post-processing\n",
        interp.post_processed
    );
    out += &source("title attribute");

    if interp.blended {
        out += &format!(
            "It contains blended data from models: {}\n",
            interp.model.as_deref().unwrap_or_default()
        );
        out += &source("title attribute, model ID attribute");
    } else if let (true, Some(model)) = (interp.blendable, &interp.model) {
        out += &format!("It contains data from {}\n", model);
        out += &source("model ID attribute");
    } else {
        out += "It has no source model information and cannot be blended\n";
        out += &source("model ID attribute (missing)");
    }

    if !interp.warnings.is_empty() {
        out += "WARNING: please check the following metadata:\n";
        for warning in &interp.warnings {
            out += warning;
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_coords(blended: bool) -> Vec<Coord> {
        let names: &[&str] = if blended { &BLENDED_TIME_COORDS } else { &UNBLENDED_TIME_COORDS };
        names
            .iter()
            .map(|n| Coord {
                name: n.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn probability_above() -> CubeMetadata {
        let mut coords = time_coords(false);
        coords.push(Coord {
            name: "air_temperature".into(),
            var_name: Some("threshold".into()),
            units: Some("K".into()),
            attributes: attrs(&[("spp__relative_to_threshold", "greater_than")]),
            is_dim: true,
        });
        CubeMetadata {
            name: "probability_of_air_temperature_above_threshold".into(),
            units: "1".into(),
            coords,
            cell_methods: vec![],
            attributes: attrs(&[
                ("source", "Met Office Unified Model"),
                ("title", "Post-Processed UKV Model Forecast on 2 km Standard Grid"),
                ("institution", "Met Office"),
                (MODEL_ID_ATTR, "uk_det"),
            ]),
        }
    }

    fn blended_probability_below() -> CubeMetadata {
        let mut cube = probability_above();
        cube.name = "probability_of_air_temperature_below_threshold".into();
        cube.coords = time_coords(true);
        cube.coords.push(Coord {
            name: "air_temperature".into(),
            var_name: Some("threshold".into()),
            attributes: attrs(&[("spp__relative_to_threshold", "less_than")]),
            is_dim: true,
            ..Default::default()
        });
        cube.cell_methods = vec![CellMethod {
            method: "maximum".into(),
            coords: vec!["time".into()],
            comment: Some("of air_temperature".into()),
        }];
        cube.attributes = attrs(&[
            ("source", "IMPROVER"),
            ("title", "IMPROVER Post-Processed Multi-Model Blend on 2 km Standard Grid"),
            ("institution", "Met Office"),
            (MODEL_ID_ATTR, "uk_det uk_ens"),
        ]);
        cube
    }

    fn wind_gust_percentiles() -> CubeMetadata {
        let mut coords = time_coords(false);
        coords.push(Coord {
            name: "percentile".into(),
            units: Some("%".into()),
            is_dim: true,
            ..Default::default()
        });
        CubeMetadata {
            name: "wind_gust".into(),
            units: "m s-1".into(),
            coords,
            cell_methods: vec![],
            attributes: attrs(&[
                ("source", "Met Office Unified Model"),
                ("title", "MOGREPS-UK Model Forecast on 2 km Standard Grid"),
                ("institution", "Met Office"),
                (MODEL_ID_ATTR, "uk_ens"),
                ("wind_gust_diagnostic", "Typical gusts"),
            ]),
        }
    }

    fn expect_error(cube: &CubeMetadata, fragment: &str) {
        match MetadataInterpreter::new().run(cube) {
            Err(MetadataError::NonCompliant(msg)) => {
                assert!(msg.contains(fragment), "'{}' not in '{}'", fragment, msg)
            }
            other => panic!("expected non-compliance, got {:?}", other),
        }
    }

    #[test]
    fn probabilities_above_threshold() {
        let interp = MetadataInterpreter::new().run(&probability_above()).unwrap();
        assert_eq!(interp.prod_type, "gridded");
        assert_eq!(interp.field_type, "probabilities");
        assert_eq!(interp.diagnostic, "air temperature");
        assert_eq!(interp.relative_to_threshold.as_deref(), Some("greater than"));
        assert!(interp.methods.is_empty());
        assert_eq!(interp.post_processed, "some");
        assert_eq!(interp.model.as_deref(), Some("UKV"));
        assert!(!interp.blended);
        assert!(interp.warnings.is_empty());
    }

    #[test]
    fn blended_probabilities_below_threshold() {
        let interp = MetadataInterpreter::new()
            .run(&blended_probability_below())
            .unwrap();
        assert_eq!(interp.relative_to_threshold.as_deref(), Some("less than"));
        assert_eq!(interp.methods, " maximum over time");
        assert_eq!(interp.model.as_deref(), Some("UKV, MOGREPS-UK"));
        assert!(interp.blended);
    }

    #[test]
    fn percentiles_and_realizations() {
        let interp = MetadataInterpreter::new().run(&wind_gust_percentiles()).unwrap();
        assert_eq!(interp.field_type, "percentiles");
        assert_eq!(interp.diagnostic, "wind gust");
        assert_eq!(interp.post_processed, "no");
        assert_eq!(interp.model.as_deref(), Some("MOGREPS-UK"));

        let mut cube = wind_gust_percentiles();
        cube.name = "air_temperature".into();
        cube.coords.retain(|c| c.name != "percentile");
        cube.attributes.remove("wind_gust_diagnostic");
        let interp = MetadataInterpreter::new().run(&cube).unwrap();
        assert_eq!(interp.field_type, "realizations");
    }

    #[test]
    fn probability_name_without_threshold_is_rejected() {
        let mut cube = wind_gust_percentiles();
        cube.name = "probability_of_air_temperature".into();
        cube.coords.retain(|c| c.name != "percentile");
        cube.attributes.remove("wind_gust_diagnostic");
        expect_error(&cube, "probability_of_air_temperature is not a valid probability cube name");
    }

    #[test]
    fn invalid_probability_name() {
        let mut cube = probability_above();
        cube.name = "probability_air_temperature_is_above_threshold".into();
        expect_error(&cube, "is not a valid probability cube name");
    }

    #[test]
    fn threshold_coordinate_problems() {
        let mut cube = probability_above();
        cube.coords.retain(|c| c.name != "air_temperature");
        expect_error(&cube, "no coord with var_name='threshold' found");

        let mut cube = probability_above();
        cube.coords.last_mut().unwrap().name = "screen_temperature".into();
        expect_error(&cube, "threshold coord has incorrect name 'screen_temperature'");

        let mut cube = probability_above();
        cube.coords.last_mut().unwrap().var_name = None;
        expect_error(&cube, "does not have var_name='threshold'");
    }

    #[test]
    fn all_errors_are_reported_together() {
        let mut cube = probability_above();
        let threshold = cube.coords.last_mut().unwrap();
        threshold.var_name = None;
        threshold
            .attributes
            .insert("spp__relative_to_threshold".into(), "less_than".into());
        cube.attributes.insert("um_version".into(), "irrelevant".into());
        match MetadataInterpreter::new().run(&cube) {
            Err(MetadataError::NonCompliant(msg)) => {
                let lines: Vec<&str> = msg.lines().collect();
                assert_eq!(lines.len(), 3);
                assert!(lines[0].contains("does not have var_name='threshold'"));
                assert!(lines[1].contains("is not consistent with"));
                assert!(lines[1].contains("less_than"));
                assert!(lines[2].contains("include one or more forbidden values"));
            }
            other => panic!("expected non-compliance, got {:?}", other),
        }
    }

    #[test]
    fn percentile_coordinate_name_and_units() {
        let mut cube = wind_gust_percentiles();
        let perc = cube.coords.last_mut().unwrap();
        perc.name = "percentile_over_realization".into();
        perc.units = Some("1".into());
        expect_error(&cube, "should have name percentile, has percentile_over_realization\n");
        expect_error(&cube, "should have units of %, has 1");
    }

    #[test]
    fn attribute_rules() {
        let mut cube = wind_gust_percentiles();
        cube.attributes.remove("title");
        expect_error(&cube, "missing one or more of mandatory attributes");

        let mut cube = wind_gust_percentiles();
        cube.attributes.remove("wind_gust_diagnostic");
        expect_error(&cube, "missing one or more required values");

        let mut cube = wind_gust_percentiles();
        cube.attributes.insert(MODEL_ID_ATTR.into(), "uk_det".into());
        expect_error(&cube, "is inconsistent with model ID attribute");

        let mut cube = wind_gust_percentiles();
        cube.attributes.insert("enigma".into(), "mysterious".into());
        let interp = MetadataInterpreter::new().run(&cube).unwrap();
        assert_eq!(interp.warnings.len(), 1);
        assert!(interp.warnings[0].contains("include unexpected attributes"));
    }

    #[test]
    fn cell_method_rules() {
        let mut cube = blended_probability_below();
        cube.cell_methods.push(CellMethod {
            method: "mean".into(),
            coords: vec!["forecast_reference_time".into()],
            comment: None,
        });
        expect_error(&cube, "Non-standard cell method");

        let mut cube = blended_probability_below();
        cube.cell_methods[0].comment = None;
        expect_error(&cube, "should have comment 'of air_temperature'");

        let mut cube = wind_gust_percentiles();
        cube.cell_methods.push(CellMethod {
            method: "median".into(),
            coords: vec!["time".into()],
            comment: None,
        });
        let interp = MetadataInterpreter::new().run(&cube).unwrap();
        assert!(interp.warnings[0].starts_with("Unexpected cell method"));
    }

    #[test]
    fn exception_fields() {
        let mut cube = wind_gust_percentiles();
        cube.name = "wind_from_direction".into();
        cube.coords.retain(|c| c.name != "percentile");
        cube.attributes.remove("wind_gust_diagnostic");
        cube.cell_methods.push(CellMethod {
            method: "mean".into(),
            coords: vec!["realization".into()],
            comment: None,
        });
        let interp = MetadataInterpreter::new().run(&cube).unwrap();
        assert_eq!(interp.diagnostic, "wind from direction");

        cube.cell_methods.push(CellMethod {
            method: "maximum".into(),
            coords: vec!["time".into()],
            comment: None,
        });
        expect_error(&cube, "Unexpected cell methods");
    }

    #[test]
    fn coordinate_rules() {
        let mut cube = blended_probability_below();
        cube.coords.retain(|c| c.name != "blend_time");
        expect_error(&cube, "Missing one or more coordinates");

        let mut cube = probability_above();
        cube.coords[1].units = Some("hours".into());
        expect_error(&cube, "does not have required units");

        let mut cube = probability_above();
        cube.coords.push(Coord {
            name: "spot_index".into(),
            ..Default::default()
        });
        expect_error(&cube, "Expected spot_index dimension");
    }

    #[test]
    fn description_of_blended_field() {
        let interp = MetadataInterpreter::new()
            .run(&blended_probability_below())
            .unwrap();
        let text = display_interpretation(&interp, false);
        assert_eq!(
            text,
            "This is a gridded probabilities file\n\
             It contains probabilities of air temperature less than thresholds\n\
             These probabilities are of air temperature maximum over time\n\
             It has undergone some significant post-processing\n\
             It contains blended data from models: UKV, MOGREPS-UK\n"
        );
        let verbose = display_interpretation(&interp, true);
        assert!(verbose.contains("    Source: cell methods\n"));
    }

    #[test]
    fn metadata_from_json() {
        let cube = CubeMetadata::from_json_str(
            r#"{"name": "air_temperature", "units": "K",
                "coords": [{"name": "time", "is_dim": true}],
                "attributes": {"title": "UKV Model Forecast"}}"#,
        )
        .unwrap();
        assert_eq!(cube.coord_names(), vec!["time"]);
        assert!(cube.cell_methods.is_empty());
        assert!(CubeMetadata::from_json_str("{").is_err());
    }

    #[test]
    fn cell_methods_attribute_parses() {
        let methods = parse_cell_methods(
            "time: maximum (comment: of wind_speed) area: time: mean (interval: 1 hour)",
        );
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].method, "maximum");
        assert_eq!(methods[0].coords, vec!["time"]);
        assert_eq!(methods[0].comment.as_deref(), Some("of wind_speed"));
        assert_eq!(methods[1].method, "mean");
        assert_eq!(methods[1].coords, vec!["area", "time"]);
        assert_eq!(methods[1].comment, None);
        assert!(parse_cell_methods("  ").is_empty());
    }

    fn netcdf_items() -> (BTreeMap<String, String>, BTreeMap<String, String>) {
        let dataset = attrs(&[
            ("NC_GLOBAL#Conventions", "CF-1.7"),
            ("NC_GLOBAL#source", "Met Office Unified Model"),
            ("NC_GLOBAL#title", "MOGREPS-UK Model Forecast on 2 km Standard Grid"),
            ("NC_GLOBAL#institution", "Met Office"),
            ("NC_GLOBAL#mosg__model_configuration", "uk_ens"),
            ("NETCDF_DIM_EXTRA", "{percentile}"),
            ("percentile#units", "%"),
            ("percentile#long_name", "percentile"),
            ("projection_x_coordinate#standard_name", "projection_x_coordinate"),
            ("projection_x_coordinate#units", "m"),
            ("projection_y_coordinate#standard_name", "projection_y_coordinate"),
            ("time#standard_name", "time"),
            ("time#units", "seconds since 1970-01-01 00:00:00"),
            ("forecast_period#standard_name", "forecast_period"),
            ("forecast_period#units", "seconds"),
            ("forecast_reference_time#standard_name", "forecast_reference_time"),
            ("forecast_reference_time#units", "seconds since 1970-01-01 00:00:00"),
        ]);
        let band = attrs(&[
            ("NETCDF_VARNAME", "wind_gust"),
            ("NETCDF_DIM_percentile", "50"),
            ("long_name", "wind_gust"),
            ("units", "m s-1"),
            ("coordinates", "forecast_period forecast_reference_time time"),
            ("cell_methods", "time: maximum"),
            ("_FillValue", "-9999"),
            ("wind_gust_diagnostic", "Typical gusts"),
        ]);
        (dataset, band)
    }

    #[test]
    fn netcdf_items_build_a_field() {
        let (dataset, band) = netcdf_items();
        let cube = CubeMetadata::from_netcdf_items(&dataset, &band).unwrap();
        assert_eq!(cube.name, "wind_gust");
        assert_eq!(cube.units, "m s-1");
        let percentile = cube.coord("percentile").unwrap();
        assert!(percentile.is_dim);
        assert_eq!(percentile.units.as_deref(), Some("%"));
        assert!(cube.coord("projection_x_coordinate").is_some_and(|c| c.is_dim));
        let time = cube.coord("time").unwrap();
        assert!(!time.is_dim);
        assert_eq!(time.units.as_deref(), Some(TIME_UNITS));
        assert_eq!(cube.cell_methods[0].coords, vec!["time"]);
        assert_eq!(cube.attributes["wind_gust_diagnostic"], "Typical gusts");
        assert_eq!(cube.attributes["institution"], "Met Office");
        assert!(!cube.attributes.contains_key("Conventions"));
        assert!(!cube.attributes.contains_key("_FillValue"));
        assert!(!cube.attributes.contains_key("coordinates"));

        let interp = MetadataInterpreter::new().run(&cube).unwrap();
        assert_eq!(interp.field_type, PERC);
        assert_eq!(interp.model.as_deref(), Some("MOGREPS-UK"));
    }

    #[test]
    fn band_without_variable_name_is_rejected() {
        let (dataset, mut band) = netcdf_items();
        band.remove("NETCDF_VARNAME");
        let err = CubeMetadata::from_netcdf_items(&dataset, &band).unwrap_err();
        assert!(matches!(err, MetadataError::NoVariable));
    }
}
