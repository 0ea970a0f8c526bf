use super::io::{float_values, text_values};
use super::stats::{ks_test_normal, mean, median, sample_std};
use super::types::{ColumnKind, TableProfile};
use crate::error::{Result, TheftcastError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Significance level below which a numeric column is treated as non-normal.
pub const NORMALITY_ALPHA: f64 = 0.05;

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub enum ImputationStrategy {
    Mean,
    Median,
    Mode,
}

impl std::fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for FillValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{x:.4}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One imputation decision, kept for the run report.
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct ImputationRecord {
    pub column: String,
    pub strategy: ImputationStrategy,
    pub ks_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub fill_value: FillValue,
    pub filled: usize,
}

/// Fills every missing cell, column by column, in place.
///
/// Numeric columns get the median when a KS test against a fitted normal
/// rejects at [`NORMALITY_ALPHA`], the mean otherwise. Categorical columns
/// get their mode.
pub fn impute(df: &mut DataFrame, profile: &TableProfile) -> Result<Vec<ImputationRecord>> {
    let mut records = Vec::new();

    for stats in &profile.columns {
        if !stats.has_missing() {
            continue;
        }
        let record = match stats.kind {
            ColumnKind::Numeric => impute_numeric(df, &stats.name)?,
            ColumnKind::Categorical => impute_categorical(df, &stats.name)?,
        };
        info!(
            "Imputed {} missing value(s) in '{}' with {} = {}",
            record.filled, record.column, record.strategy, record.fill_value
        );
        records.push(record);
    }

    if records.is_empty() {
        info!("No missing values to impute");
    }
    Ok(records)
}

fn impute_numeric(df: &mut DataFrame, name: &str) -> Result<ImputationRecord> {
    let values = float_values(df, name)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let (strategy, fill, ks) = choose_numeric_fill(name, &present)?;

    let filled = values.len() - present.len();
    let completed: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
    df.with_column(Series::new(name.into(), completed))?;

    Ok(ImputationRecord {
        column: name.to_owned(),
        strategy,
        ks_statistic: ks.map(|k| k.statistic),
        p_value: ks.map(|k| k.p_value),
        fill_value: FillValue::Number(fill),
        filled,
    })
}

/// Picks mean or median for a numeric sample.
///
/// A constant sample has no spread to test and is treated as normal.
pub fn choose_numeric_fill(
    name: &str,
    present: &[f64],
) -> Result<(ImputationStrategy, f64, Option<super::stats::KsResult>)> {
    if present.len() < 2 {
        return Err(TheftcastError::InsufficientData {
            column: name.to_owned(),
            non_missing: present.len(),
        });
    }
    let mu = mean(present).unwrap_or_default();
    let sigma = sample_std(present).unwrap_or_default();

    let Some(ks) = ks_test_normal(present, mu, sigma) else {
        debug!("'{name}' is constant, skipping normality test");
        return Ok((ImputationStrategy::Mean, mu, None));
    };

    debug!(
        "KS test for '{name}': D = {:.4}, p = {:.4}",
        ks.statistic, ks.p_value
    );
    if ks.p_value < NORMALITY_ALPHA {
        let med = median(present).unwrap_or(mu);
        Ok((ImputationStrategy::Median, med, Some(ks)))
    } else {
        Ok((ImputationStrategy::Mean, mu, Some(ks)))
    }
}

fn impute_categorical(df: &mut DataFrame, name: &str) -> Result<ImputationRecord> {
    let values = text_values(df, name)?;
    let Some(fill) = mode(&values) else {
        return Err(TheftcastError::InsufficientData {
            column: name.to_owned(),
            non_missing: 0,
        });
    };

    let filled = values.iter().filter(|v| v.is_none()).count();
    let completed: Vec<String> = values
        .into_iter()
        .map(|v| v.unwrap_or_else(|| fill.clone()))
        .collect();
    df.with_column(Series::new(name.into(), completed))?;

    Ok(ImputationRecord {
        column: name.to_owned(),
        strategy: ImputationStrategy::Mode,
        ks_statistic: None,
        p_value: None,
        fill_value: FillValue::Text(fill),
        filled,
    })
}

/// Most frequent non-missing value; ties go to the value seen first.
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, value) in values.iter().enumerate() {
        if let Some(v) = value {
            counts.entry(v.as_str()).or_insert((0, idx)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(v, _)| v.to_owned())
}

#[cfg(test)]
#[path = "imputation_tests.rs"]
mod tests;
