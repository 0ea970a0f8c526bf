//! Gradient boosted trees under logistic loss.
//!
//! Starts from the (weighted) log-odds of the positive class and adds one
//! shrunken [`RegressionTree`] per round, each fitted to the gradient and
//! hessian of the log loss at the current scores.

use super::backend::{BackendKind, Classifier, check_fit_input, check_width, normalize, not_fitted};
use super::tree::{RegressionTree, TreeParams};
use crate::config::BoostingParams;
use crate::error::Result;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::SeedableRng as _;
use rand::seq::SliceRandom as _;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

const L2_LAMBDA: f64 = 1.0;
const PROB_EPS: f64 = 1e-6;

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostingParams,
    seed: u64,
    initial_log_odds: f64,
    trees: Vec<RegressionTree>,
    feature_importances: Option<Array1<f64>>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            initial_log_odds: 0.0,
            trees: Vec::new(),
            feature_importances: None,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            lambda: L2_LAMBDA,
        }
    }

    fn round_rows(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..n).collect();
        if self.params.subsample < 1.0 {
            let keep = ((n as f64) * self.params.subsample).ceil().max(1.0) as usize;
            rows.shuffle(rng);
            rows.truncate(keep);
            rows.sort_unstable();
        }
        rows
    }
}

impl Classifier for GradientBoosting {
    fn kind(&self) -> BackendKind {
        BackendKind::GradientBoosting
    }

    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        check_fit_input(self.kind(), x, y, weights)?;
        let n = x.nrows();
        let w: Vec<f64> = match weights {
            Some(w) => w.to_vec(),
            None => vec![1.0; n],
        };
        let target: Vec<f64> = y.iter().map(|&c| c as f64).collect();

        let w_total: f64 = w.iter().sum();
        let w_pos: f64 = target.iter().zip(&w).map(|(t, wi)| t * wi).sum();
        let p0 = (w_pos / w_total).clamp(PROB_EPS, 1.0 - PROB_EPS);
        self.initial_log_odds = (p0 / (1.0 - p0)).ln();

        let mut scores = vec![self.initial_log_odds; n];
        let mut importances = vec![0.0; x.ncols()];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let tree_params = self.tree_params();
        self.trees.clear();

        for round in 0..self.params.n_rounds {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(scores[i]);
                grad[i] = w[i] * (target[i] - p);
                hess[i] = w[i] * (p * (1.0 - p)).max(PROB_EPS);
            }

            let rows = self.round_rows(n, &mut rng);
            let tree = RegressionTree::fit(x, &grad, &hess, &rows, tree_params, &mut importances);
            let step = tree.predict(x);
            for (s, d) in scores.iter_mut().zip(step.iter()) {
                *s += self.params.learning_rate * d;
            }
            if round % 50 == 0 {
                debug!("Boosting round {round}: tree depth {}", tree.depth());
            }
            self.trees.push(tree);
        }

        let mut importances = Array1::from_vec(importances);
        normalize(&mut importances);
        self.feature_importances = Some(importances);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let Some(first) = self.trees.first() else {
            return Err(not_fitted(self.kind()));
        };
        check_width(self.kind(), first.n_features(), x)?;

        let mut scores = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            scores.scaled_add(self.params.learning_rate, &tree.predict(x));
        }
        Ok(scores.mapv(sigmoid))
    }

    fn feature_importances(&self) -> Result<Array1<f64>> {
        self.feature_importances
            .clone()
            .ok_or_else(|| not_fitted(self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let n = 60;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 { i as f64 } else { ((i * 7) % 5) as f64 }
        });
        let y = Array1::from_shape_fn(n, |i| usize::from(i >= 30));
        (x, y)
    }

    fn params() -> BoostingParams {
        BoostingParams {
            n_rounds: 20,
            max_depth: 3,
            ..BoostingParams::default()
        }
    }

    #[test]
    fn test_learns_threshold() -> anyhow::Result<()> {
        let (x, y) = separable();
        let mut model = GradientBoosting::new(params(), 42);
        model.fit(x.view(), y.view(), None)?;

        let pred = model.predict(x.view())?;
        assert_eq!(pred, y);
        let proba = model.predict_proba(x.view())?;
        assert!(proba[0] < 0.5 && proba[59] > 0.5);

        let imp = model.feature_importances()?;
        assert!(imp[0] > imp[1]);
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_model() -> anyhow::Result<()> {
        let (x, y) = separable();
        let subsampled = BoostingParams {
            subsample: 0.7,
            ..params()
        };
        let mut a = GradientBoosting::new(subsampled.clone(), 7);
        let mut b = GradientBoosting::new(subsampled, 7);
        a.fit(x.view(), y.view(), None)?;
        b.fit(x.view(), y.view(), None)?;
        assert_eq!(a.predict_proba(x.view())?, b.predict_proba(x.view())?);
        Ok(())
    }

    #[test]
    fn test_width_mismatch_rejected() -> anyhow::Result<()> {
        let (x, y) = separable();
        let mut model = GradientBoosting::new(params(), 42);
        model.fit(x.view(), y.view(), None)?;
        let narrow = Array2::<f64>::zeros((3, 1));
        assert!(model.predict_proba(narrow.view()).is_err());
        Ok(())
    }
}
