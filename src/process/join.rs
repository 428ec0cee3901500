// src/process/join.rs
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::process::{commute::Commute, geography::Region, income::Income, population::Population};

/// One card in the suburb listing. Field order here is the field order in
/// the output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuburbCard {
    pub title: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Total population")]
    pub total_population: u64,
    #[serde(rename = "Median weekly rent")]
    pub median_weekly_rent: String,
    #[serde(rename = "Median weekly family income")]
    pub median_weekly_family_income: String,
    #[serde(rename = "Most popular commute method")]
    pub commute_method: String,
}

/// Index rows by code, first occurrence wins.
fn index_by_code<'a, T>(
    rows: &'a [T],
    table: &str,
    code: impl Fn(&T) -> &str,
) -> HashMap<&'a str, &'a T> {
    let mut map = HashMap::with_capacity(rows.len());
    for row in rows {
        let key = code(row);
        if map.contains_key(key) {
            warn!(table, code = key, "duplicate code, keeping first");
            continue;
        }
        map.insert(key, row);
    }
    map
}

/// Left-join income, commute and geography onto population, then keep the
/// `top_n` most populous regions (population descending, code ascending).
/// Missing text fields become empty strings.
#[instrument(level = "info", skip_all, fields(top_n = top_n))]
pub fn join_top_n(
    population: &[Population],
    income: &[Income],
    commute: &[Commute],
    geography: &[Region],
    top_n: usize,
) -> Result<Vec<SuburbCard>> {
    let income = index_by_code(income, "income", |r| r.code.as_str());
    let commute = index_by_code(commute, "commute", |r| r.code.as_str());
    let geography = index_by_code(geography, "geography", |r| r.code.as_str());

    let mut seen = HashSet::with_capacity(population.len());
    let mut cards = Vec::with_capacity(population.len());
    for p in population {
        if !seen.insert(p.code.as_str()) {
            warn!(table = "population", code = %p.code, "duplicate code, keeping first");
            continue;
        }
        let inc = income.get(p.code.as_str());
        cards.push(SuburbCard {
            title: geography
                .get(p.code.as_str())
                .map(|g| g.name.clone())
                .unwrap_or_default(),
            code: p.code.clone(),
            total_population: p.total,
            median_weekly_rent: inc.map(|i| i.median_rent_weekly.clone()).unwrap_or_default(),
            median_weekly_family_income: inc
                .map(|i| i.median_family_income_weekly.clone())
                .unwrap_or_default(),
            commute_method: commute
                .get(p.code.as_str())
                .map(|c| c.method.clone())
                .unwrap_or_default(),
        });
    }

    if cards.is_empty() {
        return Err(PipelineError::EmptyJoin);
    }

    let untitled = cards.iter().filter(|c| c.title.is_empty()).count();
    if untitled > 0 {
        warn!(untitled, "regions without a geography name");
    }

    cards.sort_by(|a, b| {
        b.total_population
            .cmp(&a.total_population)
            .then_with(|| a.code.cmp(&b.code))
    });
    cards.truncate(top_n);

    info!(
        cards = cards.len(),
        cutoff = ?cards.last().map(|c| c.total_population),
        "selected most populous regions"
    );
    Ok(cards)
}
