// src/error.rs

use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Fetch,
    Geography,
    Population,
    Income,
    Commute,
    Join,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Fetch => "fetch",
            Stage::Geography => "geography",
            Stage::Population => "population",
            Stage::Income => "income",
            Stage::Commute => "commute",
            Stage::Join => "join",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch: GET {url} failed")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{stage}: i/o on {}", .path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch: extracting {}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{stage}: reading {}", .path.display())]
    Csv {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{stage}: opening workbook {}", .path.display())]
    Workbook {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("{stage}: sheet `{sheet}` not found in {}", .path.display())]
    MissingSheet {
        stage: Stage,
        path: PathBuf,
        sheet: String,
    },

    #[error("{stage}: column `{column}` missing from {}", .path.display())]
    MissingColumn {
        stage: Stage,
        path: PathBuf,
        column: String,
    },

    #[error("{stage}: invalid value `{value}` in column `{column}` of {} (row {row})", .path.display())]
    InvalidValue {
        stage: Stage,
        path: PathBuf,
        column: String,
        row: usize,
        value: String,
    },

    #[error("{stage}: no file matches `{pattern}`")]
    NoMatch { stage: Stage, pattern: String },

    #[error("{stage}: {count} files match `{pattern}`, expected one")]
    AmbiguousMatch {
        stage: Stage,
        pattern: String,
        count: usize,
    },

    #[error("join: no population rows survived the join")]
    EmptyJoin,

    #[error("{stage}: yaml")]
    Yaml {
        stage: Stage,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(stage: Stage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Download { .. } | PipelineError::Extract { .. } => Stage::Fetch,
            PipelineError::Io { stage, .. }
            | PipelineError::Csv { stage, .. }
            | PipelineError::Workbook { stage, .. }
            | PipelineError::MissingSheet { stage, .. }
            | PipelineError::MissingColumn { stage, .. }
            | PipelineError::InvalidValue { stage, .. }
            | PipelineError::NoMatch { stage, .. }
            | PipelineError::AmbiguousMatch { stage, .. }
            | PipelineError::Yaml { stage, .. } => *stage,
            PipelineError::EmptyJoin => Stage::Join,
            PipelineError::Config(_) => Stage::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
