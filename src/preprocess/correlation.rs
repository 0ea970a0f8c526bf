use super::io::{column_names, float_values};
use super::stats::pearson;
use super::types::{ColumnKind, CorrelationMatrix, CorrelationPair, TableProfile};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PruneOutcome {
    /// Dropped columns, in the order they were marked.
    pub dropped: Vec<String>,
    /// Every over-threshold pair that was visited.
    pub pairs: Vec<CorrelationPair>,
}

/// Absolute Pearson correlations over `columns`, using pairwise-complete rows.
pub fn correlation_matrix(df: &DataFrame, columns: &[String]) -> Result<CorrelationMatrix> {
    let values: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|c| float_values(df, c))
        .collect::<Result<_>>()?;

    let n = columns.len();
    let mut data = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let (x, y): (Vec<f64>, Vec<f64>) = values[i]
                .iter()
                .zip(&values[j])
                .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                .unzip();
            let r = pearson(&x, &y).map(f64::abs);
            data[i][j] = r;
            data[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        data,
    })
}

/// Drops one column from each over-threshold pair, chosen by kind.
///
/// Pairs are visited over the strictly upper triangle in row-major order.
/// Two categoricals lose the one with more distinct values; two numerics lose
/// the one with more variance; ties drop the later column. A mixed pair is
/// left alone. Columns named in `excluded` take no part.
pub fn prune_correlated(
    df: &mut DataFrame,
    stats: &TableProfile,
    threshold: f64,
    excluded: &[&str],
) -> Result<PruneOutcome> {
    let columns: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| !excluded.contains(&c.as_str()))
        .collect();
    let matrix = correlation_matrix(df, &columns)?;

    let mut marked: Vec<String> = Vec::new();
    let mut marked_set: HashSet<&str> = HashSet::new();
    let mut pairs = Vec::new();

    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let Some(r) = matrix.get(i, j) else {
                continue;
            };
            if r <= threshold {
                continue;
            }
            let (first, second) = (&columns[i], &columns[j]);
            if marked_set.contains(first.as_str()) || marked_set.contains(second.as_str()) {
                continue;
            }

            debug!("High correlation: {first} vs {second} = {r:.2}");
            let dropped = pick_redundant(stats, first, second);
            match &dropped {
                Some(name) => {
                    info!("Dropping '{name}' from correlated pair ({first}, {second}), |r| = {r:.2}");
                    marked_set.insert(if name == first {
                        first.as_str()
                    } else {
                        second.as_str()
                    });
                    marked.push(name.clone());
                }
                None => warn!(
                    "Correlated pair ({first}, {second}) mixes categorical and numeric columns; keeping both"
                ),
            }
            pairs.push(CorrelationPair {
                first: first.clone(),
                second: second.clone(),
                coefficient: r,
                dropped,
            });
        }
    }

    for name in &marked {
        df.drop_in_place(name)?;
    }
    if marked.is_empty() {
        info!("No highly correlated columns found to drop");
    } else {
        info!("Dropped columns due to high correlation: {}", marked.join(", "));
    }

    Ok(PruneOutcome {
        dropped: marked,
        pairs,
    })
}

fn pick_redundant(stats: &TableProfile, first: &str, second: &str) -> Option<String> {
    let a = stats.get(first)?;
    let b = stats.get(second)?;
    let first_larger = match (a.kind, b.kind) {
        (ColumnKind::Categorical, ColumnKind::Categorical) => {
            a.cardinality.unwrap_or(0) > b.cardinality.unwrap_or(0)
        }
        (ColumnKind::Numeric, ColumnKind::Numeric) => {
            a.variance.unwrap_or(0.0) > b.variance.unwrap_or(0.0)
        }
        _ => return None,
    };
    Some(if first_larger { first } else { second }.to_owned())
}
