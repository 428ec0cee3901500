// src/pipeline.rs
use anyhow::{Context, Result};
use reqwest::Client;
use tokio::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::error::{self, Stage};
use crate::fetch::fetch_and_extract;
use crate::output::write_cards;
use crate::process::{
    commute::load_commute, geography::load_geography, income::load_income, join::join_top_n,
    join::SuburbCard, population::load_population, resolve_table_path,
};

/// Fetch, load, join and write. Returns the cards that were written.
pub async fn run(cfg: &Config) -> Result<Vec<SuburbCard>> {
    cfg.validate()?;
    let start = Instant::now();

    if cfg.skip_download {
        info!(work_dir = %cfg.work_dir.display(), "skipping download, using extracted tables");
    } else {
        let client = Client::new();
        let data_dir = fetch_and_extract(&client, cfg)
            .await
            .with_context(|| format!("fetching {}", cfg.archive_url))?;
        info!(data_dir = %data_dir.display(), "archive ready");
    }

    let build_cfg = cfg.clone();
    let cards = tokio::task::spawn_blocking(move || build_cards(&build_cfg))
        .await
        .context("table processing task panicked")?
        .context("building suburb cards")?;

    write_cards(&cfg.output, &cards)
        .with_context(|| format!("writing {}", cfg.output.display()))?;

    info!(cards = cards.len(), elapsed = ?start.elapsed(), "pipeline complete");
    Ok(cards)
}

/// Load the four tables from `work_dir` and join them. No I/O beyond reads.
pub fn build_cards(cfg: &Config) -> error::Result<Vec<SuburbCard>> {
    let geography_path = resolve_table_path(Stage::Geography, &cfg.table_pattern(&cfg.geography.path))?;
    let population_path =
        resolve_table_path(Stage::Population, &cfg.table_pattern(&cfg.population.path))?;
    let income_path = resolve_table_path(Stage::Income, &cfg.table_pattern(&cfg.income.path))?;
    let commute_path = resolve_table_path(Stage::Commute, &cfg.table_pattern(&cfg.commute.path))?;

    let geography = load_geography(&geography_path, &cfg.geography)?;
    let population = load_population(&population_path, &cfg.population)?;
    let income = load_income(&income_path, &cfg.income)?;
    let commute = load_commute(&commute_path, &cfg.commute)?;

    join_top_n(&population, &income, &commute, &geography, cfg.top_n)
}
