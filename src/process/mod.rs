// src/process/mod.rs
use csv::ReaderBuilder;
use glob::glob;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use tracing::{debug, trace};

use crate::error::{PipelineError, Result, Stage};

pub mod commute;
pub mod currency;
pub mod geography;
pub mod income;
pub mod join;
pub mod population;

/// A header row plus string cells, as read from a CSV table or a sheet.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// File the table came from, for error reporting.
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Index of `name` in the header row.
    pub fn column(&self, stage: Stage, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                stage,
                path: self.source.clone(),
                column: name.to_string(),
            })
    }

    /// Cell at (`row`, `col`); short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    pub fn invalid(&self, stage: Stage, col: usize, row: usize, value: &str) -> PipelineError {
        PipelineError::InvalidValue {
            stage,
            path: self.source.clone(),
            column: self.headers[col].clone(),
            // 1-based data row, header excluded
            row: row + 1,
            value: value.to_string(),
        }
    }
}

/// Read a comma-separated table with a header row. Cells are trimmed and a
/// UTF-8 BOM on the first header is dropped.
pub fn read_csv_table(stage: Stage, path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| PipelineError::io(stage, path, e))?;
    read_csv_from(stage, path, BufReader::new(file))
}

pub(crate) fn read_csv_from<R: Read>(stage: Stage, path: &Path, reader: R) -> Result<RawTable> {
    let csv_err = |source| PipelineError::Csv {
        stage,
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_err)?;
        if record.iter().all(str::is_empty) {
            trace!(row = idx, "skipping blank row");
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(path = %path.display(), columns = headers.len(), rows = rows.len(), "read table");
    Ok(RawTable {
        source: path.to_path_buf(),
        headers,
        rows,
    })
}

/// Expand `pattern` and require exactly one match.
pub fn resolve_table_path(stage: Stage, pattern: &str) -> Result<PathBuf> {
    let entries = glob(pattern)
        .map_err(|e| PipelineError::Config(format!("bad table pattern `{}`: {}", pattern, e)))?;
    let mut matches: Vec<PathBuf> = entries.filter_map(|e| e.ok()).filter(|p| p.is_file()).collect();

    match matches.len() {
        0 => Err(PipelineError::NoMatch {
            stage,
            pattern: pattern.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(PipelineError::AmbiguousMatch {
            stage,
            pattern: pattern.to_string(),
            count,
        }),
    }
}
