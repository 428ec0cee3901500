use std::path::Path;
use tracing::{info, instrument, warn};

use crate::config::IncomeConfig;
use crate::error::{Result, Stage};
use crate::process::{
    currency::{format_currency, parse_amount},
    read_csv_table, RawTable,
};

/// Median weekly rent and family income, already formatted as currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Income {
    pub code: String,
    pub median_rent_weekly: String,
    pub median_family_income_weekly: String,
}

#[instrument(level = "info", skip(cfg), fields(path = %path.display()))]
pub fn load_income(path: &Path, cfg: &IncomeConfig) -> Result<Vec<Income>> {
    let table = read_csv_table(Stage::Income, path)?;
    let rows = income_from_table(&table, cfg)?;
    info!(regions = rows.len(), "loaded income and rent");
    Ok(rows)
}

pub fn income_from_table(table: &RawTable, cfg: &IncomeConfig) -> Result<Vec<Income>> {
    let code_col = table.column(Stage::Income, &cfg.code_column)?;
    let rent_col = table.column(Stage::Income, &cfg.rent_column)?;
    let income_col = table.column(Stage::Income, &cfg.income_column)?;

    let currency = |row: usize, col: usize| -> Result<String> {
        let raw = table.cell(row, col);
        parse_amount(raw)
            .map(|v| format_currency(v, &cfg.currency_symbol))
            .ok_or_else(|| table.invalid(Stage::Income, col, row, raw))
    };

    let mut out = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        let code = table.cell(row, code_col);
        if code.is_empty() {
            warn!(row = row + 1, "income row without a code");
            continue;
        }
        out.push(Income {
            code: code.to_string(),
            median_rent_weekly: currency(row, rent_col)?,
            median_family_income_weekly: currency(row, income_col)?,
        });
    }
    Ok(out)
}
