// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;
use url::Url;

use crate::error::{PipelineError, Result, Stage};
use crate::process::commute::Substitution;

/// 2021 Census General Community Profile, Suburbs and Localities, short headers.
pub const DEFAULT_ARCHIVE_URL: &str =
    "https://www.abs.gov.au/census/find-census-data/datapacks/download/2021_GCP_SAL_for_AUS_short-header.zip";

/// Everything the pipeline needs to know about where inputs live and what
/// they are called. Loaded from YAML; every field falls back to the DataPack
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub archive_url: String,
    pub work_dir: PathBuf,
    /// Where the downloaded zip is stored. Defaults to `work_dir/<url file name>`.
    pub archive_path: Option<PathBuf>,
    /// Directory inside the archive holding the data tables.
    pub extracted_dir: String,
    /// Name `extracted_dir` is renamed to after extraction.
    pub data_alias: String,
    pub geography: GeographyConfig,
    pub population: PopulationConfig,
    pub income: IncomeConfig,
    pub commute: CommuteConfig,
    pub top_n: usize,
    pub output: PathBuf,
    /// Reuse an archive already extracted under `work_dir`.
    pub skip_download: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeographyConfig {
    pub path: String,
    pub sheet: String,
    pub type_column: String,
    pub type_value: String,
    pub code_column: String,
    pub name_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub path: String,
    pub code_column: String,
    pub total_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeConfig {
    pub path: String,
    pub code_column: String,
    pub rent_column: String,
    pub income_column: String,
    pub currency_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommuteConfig {
    pub path: String,
    pub code_column: String,
    /// Count columns end with this (persons totals).
    pub value_suffix: String,
    /// Regex for total columns that must not compete as a method.
    pub exclude_pattern: String,
    pub substitutions: Vec<Substitution>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            work_dir: PathBuf::from("census"),
            archive_path: None,
            extracted_dir: "2021 Census GCP Suburbs and Localities for AUS".to_string(),
            data_alias: "data".to_string(),
            geography: GeographyConfig::default(),
            population: PopulationConfig::default(),
            income: IncomeConfig::default(),
            commute: CommuteConfig::default(),
            top_n: 100,
            output: PathBuf::from("suburbs.yml"),
            skip_download: false,
        }
    }
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            path: "Metadata/2021Census_geog_desc_1st_2nd_3rd_release.xlsx".to_string(),
            sheet: "2021_ASGS_Non_ABS_Structures".to_string(),
            type_column: "ASGS_Structure".to_string(),
            type_value: "SAL".to_string(),
            code_column: "Census_Code_2021".to_string(),
            name_column: "Census_Name_2021".to_string(),
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            path: "data/2021Census_G01_AUST_SAL.csv".to_string(),
            code_column: "SAL_CODE_2021".to_string(),
            total_column: "Tot_P_P".to_string(),
        }
    }
}

impl Default for IncomeConfig {
    fn default() -> Self {
        Self {
            path: "data/2021Census_G02_AUST_SAL.csv".to_string(),
            code_column: "SAL_CODE_2021".to_string(),
            rent_column: "Median_rent_weekly".to_string(),
            income_column: "Median_tot_fam_inc_weekly".to_string(),
            currency_symbol: "$".to_string(),
        }
    }
}

impl Default for CommuteConfig {
    fn default() -> Self {
        Self {
            path: "data/2021Census_G62_AUST_SAL.csv".to_string(),
            code_column: "SAL_CODE_2021".to_string(),
            value_suffix: "_P".to_string(),
            exclude_pattern: r"(?i)(^|_)tot(_|$)".to_string(),
            substitutions: crate::process::commute::default_substitutions(),
        }
    }
}

impl Config {
    /// Read a YAML config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(Stage::Config, path, e))?;
        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| PipelineError::Yaml {
            stage: Stage::Config,
            source,
        })?;
        debug!(path = %path.display(), "loaded config");
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(PipelineError::Config("top_n must be at least 1".into()));
        }
        if self.commute.value_suffix.is_empty() {
            return Err(PipelineError::Config(
                "commute.value_suffix must not be empty".into(),
            ));
        }
        if self.commute.substitutions.iter().any(|s| s.pattern.is_empty()) {
            return Err(PipelineError::Config(
                "commute.substitutions contains an empty pattern".into(),
            ));
        }
        regex::Regex::new(&self.commute.exclude_pattern).map_err(|e| {
            PipelineError::Config(format!("commute.exclude_pattern: {}", e))
        })?;
        Ok(())
    }

    /// Local path for the downloaded archive.
    pub fn archive_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.archive_path {
            return Ok(p.clone());
        }
        let url = Url::parse(&self.archive_url)
            .map_err(|e| PipelineError::Config(format!("archive_url `{}`: {}", self.archive_url, e)))?;
        let filename = url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .unwrap_or("download.zip");
        Ok(self.work_dir.join(filename))
    }

    /// Resolve a table path (possibly a glob) against `work_dir`. Only
    /// `relative` is a pattern; `work_dir` is matched literally.
    pub fn table_pattern(&self, relative: &str) -> String {
        let base = glob::Pattern::escape(&self.work_dir.to_string_lossy());
        Path::new(&base).join(relative).to_string_lossy().into_owned()
    }
}
