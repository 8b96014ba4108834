//! Text and JSON renderings of skill statistics and crossovers.
use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::api::CrossoverRow;
use crate::types::Stat;
use crate::verify::StatsTable;

fn stat_column(table: &StatsTable, threshold: f64, stat: Stat) -> BTreeMap<i64, f64> {
    let (leadtimes, values) = table.trend_with_leadtime(threshold, stat);
    leadtimes.into_iter().zip(values).collect()
}

fn cell(value: Option<&f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:>7.3}", v),
        Some(_) => format!("{:>7}", "nan"),
        None => format!("{:>7}", "-"),
    }
}

/// One table per model and statistic: thresholds down, lead times across
pub fn stats_text(tables: &BTreeMap<String, StatsTable>, stats: &[Stat], thresholds: &[f64]) -> String {
    let mut out = String::new();
    for (model, table) in tables {
        let leadtimes = table.leadtimes();
        for &stat in stats {
            out.push_str(&format!("{} {}\n", model, stat));
            out.push_str(&format!("{:>9}", "threshold"));
            for lt in &leadtimes {
                out.push_str(&format!("{:>7}", lt));
            }
            out.push('\n');
            for &threshold in thresholds {
                let column = stat_column(table, threshold, stat);
                out.push_str(&format!("{:>9}", threshold));
                for lt in &leadtimes {
                    out.push_str(&cell(column.get(lt)));
                }
                out.push('\n');
            }
            out.push('\n');
        }
    }
    out
}

/// `{model: {stat: {threshold: {leadtime: value}}}}`; undefined values are null
pub fn stats_json(
    tables: &BTreeMap<String, StatsTable>,
    stats: &[Stat],
    thresholds: &[f64],
) -> serde_json::Result<String> {
    let mut root = Map::new();
    for (model, table) in tables {
        let mut by_stat = Map::new();
        for &stat in stats {
            let mut by_threshold = Map::new();
            for &threshold in thresholds {
                let column: Map<String, Value> = stat_column(table, threshold, stat)
                    .into_iter()
                    .map(|(lt, v)| (lt.to_string(), json!(v.is_finite().then_some(v))))
                    .collect();
                by_threshold.insert(threshold.to_string(), Value::Object(column));
            }
            by_stat.insert(stat.to_string(), Value::Object(by_threshold));
        }
        root.insert(model.clone(), Value::Object(by_stat));
    }
    serde_json::to_string_pretty(&Value::Object(root))
}

fn threshold_row(table: &StatsTable, leadtime: i64, stat: Stat) -> Vec<(f64, f64)> {
    let (thresholds, values) = table.trend_with_threshold(leadtime, stat);
    thresholds.into_iter().zip(values).collect()
}

/// One table per model and statistic: lead times down, thresholds across
pub fn threshold_text(tables: &BTreeMap<String, StatsTable>, stats: &[Stat], leadtimes: &[i64]) -> String {
    let mut out = String::new();
    for (model, table) in tables {
        let mut thresholds: Vec<f64> = Vec::new();
        for by_thresh in table.data.values() {
            for t in by_thresh.keys() {
                if !thresholds.iter().any(|x| t.is_close(*x)) {
                    thresholds.push(t.0);
                }
            }
        }
        thresholds.sort_by(f64::total_cmp);
        for &stat in stats {
            out.push_str(&format!("{} {}\n", model, stat));
            out.push_str(&format!("{:>9}", "leadtime"));
            for t in &thresholds {
                out.push_str(&format!("{:>7}", t));
            }
            out.push('\n');
            for &lt in leadtimes {
                let row = threshold_row(table, lt, stat);
                out.push_str(&format!("{:>9}", lt));
                for t in &thresholds {
                    let value = row.iter().find(|(x, _)| x == t).map(|(_, v)| v);
                    out.push_str(&cell(value));
                }
                out.push('\n');
            }
            out.push('\n');
        }
    }
    out
}

/// `{model: {stat: {leadtime: {threshold: value}}}}`; undefined values are null
pub fn threshold_json(
    tables: &BTreeMap<String, StatsTable>,
    stats: &[Stat],
    leadtimes: &[i64],
) -> serde_json::Result<String> {
    let mut root = Map::new();
    for (model, table) in tables {
        let mut by_stat = Map::new();
        for &stat in stats {
            let by_leadtime: Map<String, Value> = leadtimes
                .iter()
                .map(|lt| {
                    let row: Map<String, Value> = threshold_row(table, *lt, stat)
                        .into_iter()
                        .map(|(t, v)| (t.to_string(), json!(v.is_finite().then_some(v))))
                        .collect();
                    (lt.to_string(), Value::Object(row))
                })
                .collect();
            by_stat.insert(stat.to_string(), Value::Object(by_leadtime));
        }
        root.insert(model.clone(), Value::Object(by_stat));
    }
    serde_json::to_string_pretty(&Value::Object(root))
}

pub fn crossover_text(rows: &[CrossoverRow]) -> String {
    let with_regimes = rows.iter().any(|r| r.regime.is_some());
    let mut out = format!(
        "{:<16}{:>10}{:>10}{:>8}{:>8}",
        "cycle", "wet_pixels", "wet_frac", "time", "csi"
    );
    if with_regimes {
        out.push_str(&format!("{:>8}{:>9}", "regime", "cluster"));
    }
    out.push('\n');
    for row in rows {
        let c = &row.crossover;
        out.push_str(&format!(
            "{:<16}{:>10}{:>10.4}{:>8.1}{:>8.3}",
            c.cycle, c.wet_pixels, c.wet_fraction, c.time, c.csi
        ));
        if with_regimes {
            let show = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
            out.push_str(&format!("{:>8}{:>9}", show(row.regime), show(row.cluster)));
        }
        out.push('\n');
    }
    out
}

pub fn crossover_json(rows: &[CrossoverRow]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}
