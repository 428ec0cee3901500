// src/process/geography.rs
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::config::GeographyConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::process::{read_csv_table, RawTable};

/// A suburb/locality: its code and display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub code: String,
    pub name: String,
}

/// Load region names from the geography metadata. Workbooks are read with
/// calamine; a `.csv` path is read as a plain table.
#[instrument(level = "info", skip(cfg), fields(path = %path.display()))]
pub fn load_geography(path: &Path, cfg: &GeographyConfig) -> Result<Vec<Region>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let table = if is_csv {
        read_csv_table(Stage::Geography, path)?
    } else {
        read_sheet(path, &cfg.sheet, &cfg.type_column)?
    };

    let regions = select_regions(&table, cfg)?;
    info!(
        regions = regions.len(),
        structure = %cfg.type_value,
        "loaded geography"
    );
    Ok(regions)
}

/// Read one worksheet into a `RawTable`. The header is the first row that
/// contains `header_marker`; rows above it (titles, notes) are ignored.
fn read_sheet(path: &Path, sheet: &str, header_marker: &str) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|source| PipelineError::Workbook {
        stage: Stage::Geography,
        path: path.to_path_buf(),
        source,
    })?;

    if !workbook.sheet_names().iter().any(|s| s == sheet) {
        return Err(PipelineError::MissingSheet {
            stage: Stage::Geography,
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|source| PipelineError::Workbook {
            stage: Stage::Geography,
            path: path.to_path_buf(),
            source,
        })?;

    let cells: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    Ok(table_from_cells(path, cells, header_marker))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn table_from_cells(path: &Path, cells: Vec<Vec<String>>, header_marker: &str) -> RawTable {
    let mut rows = cells.into_iter();
    let mut headers = Vec::new();
    for row in rows.by_ref() {
        if row.iter().any(|c| c == header_marker) {
            headers = row;
            break;
        }
    }
    RawTable {
        source: path.to_path_buf(),
        headers,
        rows: rows.filter(|r| r.iter().any(|c| !c.is_empty())).collect(),
    }
}

/// Keep rows whose type column equals `type_value`, projected to code + name.
pub fn select_regions(table: &RawTable, cfg: &GeographyConfig) -> Result<Vec<Region>> {
    let type_col = table.column(Stage::Geography, &cfg.type_column)?;
    let code_col = table.column(Stage::Geography, &cfg.code_column)?;
    let name_col = table.column(Stage::Geography, &cfg.name_column)?;

    let mut regions = Vec::new();
    for row in 0..table.rows.len() {
        if table.cell(row, type_col) != cfg.type_value {
            continue;
        }
        let code = table.cell(row, code_col);
        if code.is_empty() {
            warn!(row = row + 1, "geography row without a code");
            continue;
        }
        regions.push(Region {
            code: code.to_string(),
            name: table.cell(row, name_col).to_string(),
        });
    }
    Ok(regions)
}
