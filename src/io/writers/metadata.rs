use gdal::Dataset;
use gdal::Metadata;
use std::collections::BTreeMap;
use tracing::debug;

use crate::io::gdal::{GridError, spatial_ref_from};

/// Provenance recorded on every file this crate writes
pub fn provenance_fields() -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("improver_tool".to_string(), "improver".to_string());
    fields.insert(
        "improver_version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    fields.insert(
        "history".to_string(),
        format!("{}: IMPROVER", chrono::Utc::now().to_rfc3339()),
    );
    fields
}

/// Keys an input driver manages itself are not copied to outputs
pub fn is_copyable_key(key: &str) -> bool {
    !key.starts_with("NETCDF_") && !key.contains('#')
}

/// Set georeferencing and metadata items on an open output dataset.
///
/// An identity geotransform is treated as "no georeferencing", in which case
/// neither the transform nor the projection is written.
pub fn embed_grid_metadata(
    ds: &mut Dataset,
    geotransform: [f64; 6],
    projection: &str,
    metadata: &BTreeMap<String, String>,
) -> Result<(), GridError> {
    let is_identity = |gt: [f64; 6]| {
        gt[0] == 0.0 && gt[1] == 1.0 && gt[2] == 0.0 && gt[3] == 0.0 && gt[4] == 0.0 && gt[5] == 1.0
    };

    if !is_identity(geotransform) {
        ds.set_geo_transform(&geotransform)?;
        if projection.starts_with("EPSG:") {
            ds.set_projection(&spatial_ref_from(projection)?.to_wkt()?)?;
        } else if !projection.is_empty() {
            ds.set_projection(projection)?;
        }
    }

    let mut items = metadata.clone();
    items.extend(provenance_fields());
    for (key, value) in items.iter().filter(|(k, _)| is_copyable_key(k)) {
        ds.set_metadata_item(key, value, "")?;
    }
    debug!("Embedded {} metadata item(s)", items.len());

    Ok(())
}

/// Set the items of `band_meta` that the dataset does not already carry
/// with the same value on one band
pub fn embed_band_metadata<M: Metadata>(
    band: &mut M,
    band_meta: &BTreeMap<String, String>,
    dataset_meta: &BTreeMap<String, String>,
) -> Result<usize, GridError> {
    let mut written = 0;
    for (key, value) in band_meta {
        if !is_copyable_key(key) || dataset_meta.get(key) == Some(value) {
            continue;
        }
        band.set_metadata_item(key, value, "")?;
        written += 1;
    }
    Ok(written)
}
