// src/process/population.rs
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::config::PopulationConfig;
use crate::error::{Result, Stage};
use crate::process::{read_csv_table, RawTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    pub code: String,
    pub total: u64,
}

#[instrument(level = "info", skip(cfg), fields(path = %path.display()))]
pub fn load_population(path: &Path, cfg: &PopulationConfig) -> Result<Vec<Population>> {
    let table = read_csv_table(Stage::Population, path)?;
    let rows = population_from_table(&table, cfg)?;
    info!(regions = rows.len(), "loaded population");
    Ok(rows)
}

pub fn population_from_table(table: &RawTable, cfg: &PopulationConfig) -> Result<Vec<Population>> {
    let code_col = table.column(Stage::Population, &cfg.code_column)?;
    let total_col = table.column(Stage::Population, &cfg.total_column)?;

    let mut out = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        let code = table.cell(row, code_col);
        if code.is_empty() {
            warn!(row = row + 1, "population row without a code");
            continue;
        }
        let raw = table.cell(row, total_col);
        let total = parse_count(raw)
            .ok_or_else(|| table.invalid(Stage::Population, total_col, row, raw))?;
        out.push(Population {
            code: code.to_string(),
            total,
        });
    }
    Ok(out)
}

/// Non-negative whole number; `"42"` and `"42.0"` both read as 42.
pub fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}
