// src/output.rs
use std::{
    fs,
    io::Write,
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::error::{PipelineError, Result, Stage};
use crate::process::join::SuburbCard;

/// Serialize `cards` as a YAML sequence, one mapping per card. The file is
/// written next to `path` first and renamed into place, so a failed run
/// leaves any previous file untouched.
#[instrument(level = "info", skip(cards), fields(path = %path.display(), cards = cards.len()))]
pub fn write_cards(path: &Path, cards: &[SuburbCard]) -> Result<()> {
    let yaml = serde_yaml::to_string(cards).map_err(|source| PipelineError::Yaml {
        stage: Stage::Output,
        source,
    })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(Stage::Output, dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(Stage::Output, dir, e))?;
    if let Err(e) = tmp.write_all(yaml.as_bytes()).and_then(|_| tmp.flush()) {
        return Err(PipelineError::io(Stage::Output, tmp.path(), e));
    }
    tmp.persist(path)
        .map_err(|e| PipelineError::io(Stage::Output, path, e.error))?;

    info!(bytes = yaml.len(), "wrote cards");
    Ok(())
}

/// Parse a file written by `write_cards`.
pub fn read_cards(path: &Path) -> Result<Vec<SuburbCard>> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(Stage::Output, path, e))?;
    serde_yaml::from_str(&text).map_err(|source| PipelineError::Yaml {
        stage: Stage::Output,
        source,
    })
}
