// src/process/commute.rs
//
// Wide travel-to-work table → one most popular method per region.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};
use tracing::{debug, info, instrument, warn};

use crate::config::CommuteConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::process::{population::parse_count, read_csv_table, RawTable};

/// One ordered text replacement applied to a raw method code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Order matters: tier prefixes go first, long spellings before any shorter
/// pattern they contain, `_P` before the bare `_`. Leftover underscores are
/// dropped; a config can map `_` to a joiner such as `" + "` instead.
static DEFAULT_SUBSTITUTIONS: Lazy<Vec<Substitution>> = Lazy::new(|| {
    [
        ("One_method_", ""),
        ("One_meth_", ""),
        ("Two_methods_", ""),
        ("Two_meth_", ""),
        ("Three_methods_", ""),
        ("Three_meth_", ""),
        ("Car_as_driver", "🚗 Driving"),
        ("Car_as_drvr", "🚗 Driving"),
        ("Car_as_passenger", "🚘 Passenger"),
        ("Car_as_pass", "🚘 Passenger"),
        ("Tram_incl_light_rail", "🚋 Tram"),
        ("Tram_incl_lt_rail", "🚋 Tram"),
        ("Taxi_ride_sh_serv", "🚕 Taxi"),
        ("Motorbike_scooter", "🛵 Motorbike"),
        ("Motorbike_scootr", "🛵 Motorbike"),
        ("Walked_only", "🚶 Walk"),
        ("Worked_home", "🏠 Worked from home"),
        ("Did_not_go_to_work", "🛌 Didn't go to work"),
        ("Method_travel_to_work_ns", "❓ Not stated"),
        ("Other_three_meth", "Other"),
        ("Oth_three_meth", "Other"),
        ("Other_two_meth", "Other"),
        ("Oth_two_meth", "Other"),
        ("_2_oth_meth", " + 2 others"),
        ("Train", "🚂 Train"),
        ("Trn", "🚂 Train"),
        ("Bus", "🚌 Bus"),
        ("Ferry", "⛴️ Ferry"),
        ("Truck", "🚚 Truck"),
        ("Bicycle", "🚲 Bicycle"),
        ("_P", ""),
        ("_", ""),
    ]
    .iter()
    .map(|(p, r)| Substitution::new(p, r))
    .collect()
});

pub fn default_substitutions() -> Vec<Substitution> {
    DEFAULT_SUBSTITUTIONS.clone()
}

/// A region's most popular way of getting to work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commute {
    pub code: String,
    pub method: String,
}

/// Long-form row: one (region, method) count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCount {
    pub code: String,
    pub method: String,
    pub count: u64,
}

#[instrument(level = "info", skip(cfg), fields(path = %path.display()))]
pub fn load_commute(path: &Path, cfg: &CommuteConfig) -> Result<Vec<Commute>> {
    let table = read_csv_table(Stage::Commute, path)?;
    let rows = reduce_commute(&table, cfg)?;
    info!(regions = rows.len(), "reduced commute methods");
    Ok(rows)
}

pub fn reduce_commute(table: &RawTable, cfg: &CommuteConfig) -> Result<Vec<Commute>> {
    let code_col = table.column(Stage::Commute, &cfg.code_column)?;
    let method_cols = select_method_columns(table, cfg)?;
    let long = melt(table, code_col, &method_cols)?;
    debug!(long_rows = long.len(), "reshaped to long form");

    Ok(pick_most_popular(long)
        .into_iter()
        .map(|m| Commute {
            method: apply_substitutions(&m.method, &cfg.substitutions),
            code: m.code,
        })
        .collect())
}

/// Indices of the count columns: names ending in `value_suffix` that are not
/// totals. Source order is kept; it decides ties later.
pub fn select_method_columns(table: &RawTable, cfg: &CommuteConfig) -> Result<Vec<usize>> {
    let exclude = Regex::new(&cfg.exclude_pattern)
        .map_err(|e| PipelineError::Config(format!("commute.exclude_pattern: {}", e)))?;

    let cols: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| name.ends_with(&cfg.value_suffix) && *name != &cfg.code_column)
        .filter(|(_, name)| !exclude.is_match(name))
        .map(|(i, _)| i)
        .collect();

    if cols.is_empty() {
        return Err(PipelineError::MissingColumn {
            stage: Stage::Commute,
            path: table.source.clone(),
            column: format!("*{}", cfg.value_suffix),
        });
    }
    debug!(columns = cols.len(), "selected method columns");
    Ok(cols)
}

/// Wide to long: one `MethodCount` per (row, method column). Blank cells count
/// as zero. A code repeated on a later row is skipped; the first row wins.
pub fn melt(table: &RawTable, code_col: usize, method_cols: &[usize]) -> Result<Vec<MethodCount>> {
    let mut out = Vec::with_capacity(table.rows.len() * method_cols.len());
    let mut seen: HashSet<&str> = HashSet::new();
    for row in 0..table.rows.len() {
        let code = table.cell(row, code_col);
        if code.is_empty() {
            continue;
        }
        if !seen.insert(code) {
            warn!(code, row = row + 1, "duplicate code, keeping first");
            continue;
        }
        for &col in method_cols {
            let raw = table.cell(row, col);
            let count = if raw.is_empty() {
                0
            } else {
                parse_count(raw).ok_or_else(|| table.invalid(Stage::Commute, col, row, raw))?
            };
            out.push(MethodCount {
                code: code.to_string(),
                method: table.headers[col].clone(),
                count,
            });
        }
    }
    Ok(out)
}

/// Drop zero counts and keep exactly one row per region: the highest count,
/// ties going to the method seen first. Regions keep first-seen order; a
/// region with nothing but zeros disappears.
pub fn pick_most_popular(long: Vec<MethodCount>) -> Vec<MethodCount> {
    let mut best: Vec<MethodCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in long.into_iter().filter(|r| r.count > 0) {
        match index.get(&row.code) {
            Some(&i) => {
                if row.count > best[i].count {
                    best[i] = row;
                }
            }
            None => {
                index.insert(row.code.clone(), best.len());
                best.push(row);
            }
        }
    }
    best
}

/// Run every substitution over `raw`, in order, then trim.
pub fn apply_substitutions(raw: &str, subs: &[Substitution]) -> String {
    let mut label = raw.to_string();
    for s in subs {
        if label.contains(&s.pattern) {
            label = label.replace(&s.pattern, &s.replacement);
        }
    }
    label.trim().to_string()
}
