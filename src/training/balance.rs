//! Class-imbalance handling for the training split.

use super::dataset::TrainingData;
use crate::config::BalanceStrategy;
use crate::error::{Result, TheftcastError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::info;

pub const SMOTE_NEIGHBOURS: usize = 5;

/// Training data after balancing, plus sample weights when the strategy
/// weights rather than resamples.
#[derive(Debug, Clone)]
pub struct Balanced {
    pub data: TrainingData,
    pub weights: Option<Array1<f64>>,
}

pub fn apply(strategy: BalanceStrategy, data: &TrainingData, seed: u64) -> Result<Balanced> {
    match strategy {
        BalanceStrategy::None => Ok(Balanced {
            data: data.clone(),
            weights: None,
        }),
        BalanceStrategy::ClassWeights => {
            let [w0, w1] = class_weights(data.y.view());
            info!("Balanced class weights: class 0 = {w0:.3}, class 1 = {w1:.3}");
            Ok(Balanced {
                data: data.clone(),
                weights: Some(sample_weights(data.y.view())),
            })
        }
        BalanceStrategy::SmoteTomek => {
            let (x, y) = smote_tomek(data.x.view(), data.y.view(), SMOTE_NEIGHBOURS, seed)?;
            let resampled = TrainingData::new(x, y, data.feature_names.clone(), data.classes.clone())?;
            Ok(Balanced {
                data: resampled,
                weights: None,
            })
        }
    }
}

/// Balanced weights `n / (2 * n_c)` for classes 0 and 1.
pub fn class_weights(y: ArrayView1<'_, usize>) -> [f64; 2] {
    let n = y.len() as f64;
    let positives = y.iter().filter(|&&c| c == 1).count() as f64;
    let negatives = n - positives;
    let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 0.0 };
    [weight(negatives), weight(positives)]
}

pub fn sample_weights(y: ArrayView1<'_, usize>) -> Array1<f64> {
    let weights = class_weights(y);
    y.mapv(|c| weights[c.min(1)])
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum()
}

/// Indices (into `rows`) of the `k` nearest rows to `rows[target]`, itself
/// excluded; ties go to the lower index.
fn nearest_within(x: ArrayView2<'_, f64>, rows: &[usize], target: usize, k: usize) -> Vec<usize> {
    let origin = x.row(rows[target]);
    let mut dists: Vec<(f64, usize)> = rows
        .iter()
        .enumerate()
        .filter(|(pos, _)| *pos != target)
        .map(|(pos, &r)| (squared_distance(origin, x.row(r)), pos))
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.truncate(k);
    dists.into_iter().map(|(_, pos)| pos).collect()
}

/// Oversamples the minority class to parity by interpolating between a
/// minority row and one of its `k` nearest minority neighbours.
pub fn smote(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, usize>,
    k: usize,
    seed: u64,
) -> Result<(Array2<f64>, Array1<usize>)> {
    let minority_rows: Vec<usize>;
    let majority_count;
    {
        let ones: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 1).collect();
        let zeros: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 0).collect();
        if ones.is_empty() || zeros.is_empty() {
            return Err(TheftcastError::InvalidLabel(
                "SMOTE needs both classes in the training split".to_owned(),
            ));
        }
        if ones.len() <= zeros.len() {
            majority_count = zeros.len();
            minority_rows = ones;
        } else {
            majority_count = ones.len();
            minority_rows = zeros;
        }
    }

    let to_generate = majority_count - minority_rows.len();
    if to_generate == 0 {
        return Ok((x.to_owned(), y.to_owned()));
    }
    let minority_class = y[minority_rows[0]];
    let k = k.min(minority_rows.len() - 1);
    let neighbours: Vec<Vec<usize>> = (0..minority_rows.len())
        .into_par_iter()
        .map(|pos| nearest_within(x, &minority_rows, pos, k))
        .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut synthetic = Array2::<f64>::zeros((to_generate, x.ncols()));
    for mut out in synthetic.rows_mut() {
        let base = rng.gen_range(0..minority_rows.len());
        let origin = x.row(minority_rows[base]);
        match neighbours[base].as_slice() {
            [] => out.assign(&origin),
            candidates => {
                let pick = candidates[rng.gen_range(0..candidates.len())];
                let other = x.row(minority_rows[pick]);
                let gap: f64 = rng.r#gen();
                out.assign(&(&origin + &((&other - &origin) * gap)));
            }
        }
    }

    let mut x_out = x.to_owned();
    x_out
        .append(Axis(0), synthetic.view())
        .map_err(|e| TheftcastError::Training(format!("SMOTE concatenation failed: {e}")))?;
    let mut y_out = y.to_vec();
    y_out.extend(std::iter::repeat_n(minority_class, to_generate));
    info!(
        "SMOTE generated {to_generate} synthetic row(s) for class {minority_class} (k = {k})"
    );
    Ok((x_out, Array1::from_vec(y_out)))
}

/// Pairs of opposite-class rows that are each other's nearest neighbour.
pub fn tomek_links(x: ArrayView2<'_, f64>, y: ArrayView1<'_, usize>) -> Vec<(usize, usize)> {
    let all: Vec<usize> = (0..x.nrows()).collect();
    let nearest: Vec<Option<usize>> = (0..x.nrows())
        .into_par_iter()
        .map(|i| nearest_within(x, &all, i, 1).first().copied())
        .collect();

    nearest
        .iter()
        .enumerate()
        .filter_map(|(i, nn)| {
            let j = (*nn)?;
            (i < j && nearest[j] == Some(i) && y[i] != y[j]).then_some((i, j))
        })
        .collect()
}

/// SMOTE to parity, then drop both rows of every Tomek link.
pub fn smote_tomek(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, usize>,
    k: usize,
    seed: u64,
) -> Result<(Array2<f64>, Array1<usize>)> {
    let (x_os, y_os) = smote(x, y, k, seed)?;
    let links = tomek_links(x_os.view(), y_os.view());
    let drop: HashSet<usize> = links.iter().flat_map(|&(a, b)| [a, b]).collect();
    let keep: Vec<usize> = (0..x_os.nrows()).filter(|i| !drop.contains(i)).collect();
    info!("Tomek cleaning removed {} row(s) in {} link(s)", drop.len(), links.len());
    Ok((x_os.select(Axis(0), &keep), y_os.select(Axis(0), &keep)))
}
