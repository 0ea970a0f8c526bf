use super::backend::{BackendKind, Classifier, check_fit_input, check_width, normalize, not_fitted};
use crate::config::ForestParams;
use crate::error::{Result, TheftcastError};
use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom as _;
use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestTree {
    tree: DecisionTree<f64, usize>,
    /// Columns of the full matrix this tree was grown on.
    columns: Vec<usize>,
}

/// Bagged CART trees, each on a bootstrap sample and a random √p feature
/// subspace. Class-1 probability is the fraction of trees voting 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    seed: u64,
    n_features: usize,
    trees: Vec<ForestTree>,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForest {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            n_features: 0,
            trees: Vec::new(),
            feature_importances: None,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn subspace_size(n_features: usize) -> usize {
        ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features)
    }

    /// Minimum total sample weight per leaf.
    ///
    /// Scaled by the lightest sample so that `min_samples_leaf` keeps meaning
    /// a number of samples when class weights are below 1.
    fn leaf_weight(&self, weights: &[f64]) -> f32 {
        let lightest = weights
            .iter()
            .copied()
            .filter(|w| w.is_finite() && *w > 0.0)
            .fold(f64::INFINITY, f64::min);
        let unit = if lightest.is_finite() { lightest } else { 1.0 };
        (self.params.min_samples_leaf as f64 * unit) as f32
    }

    fn grow_tree(
        &self,
        tree_idx: usize,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        weights: &[f64],
        leaf_weight: f32,
    ) -> Result<ForestTree> {
        let seed = self.seed.wrapping_add(tree_idx as u64);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = x.nrows();

        let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let mut columns: Vec<usize> = (0..x.ncols()).collect();
        columns.shuffle(&mut rng);
        columns.truncate(Self::subspace_size(x.ncols()));
        columns.sort_unstable();

        let records = x.select(Axis(0), &rows).select(Axis(1), &columns);
        let targets = y.select(Axis(0), &rows);
        let sample_weights: Array1<f32> = rows.iter().map(|&i| weights[i] as f32).collect();
        let dataset = Dataset::new(records, targets).with_weights(sample_weights);

        let tree = DecisionTree::params()
            .max_depth(Some(self.params.max_depth))
            .min_weight_leaf(leaf_weight)
            .fit(&dataset)
            .map_err(|e| TheftcastError::Training(format!("Decision tree {tree_idx} failed: {e}")))?;
        Ok(ForestTree { tree, columns })
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> BackendKind {
        BackendKind::RandomForest
    }

    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        check_fit_input(self.kind(), x, y, weights)?;
        let weights: Vec<f64> = match weights {
            Some(w) => w.to_vec(),
            None => vec![1.0; x.nrows()],
        };

        let leaf_weight = self.leaf_weight(&weights);
        let trees = (0..self.params.n_trees)
            .into_par_iter()
            .map(|idx| self.grow_tree(idx, x, y, &weights, leaf_weight))
            .collect::<Result<Vec<_>>>()?;

        let mut importances = Array1::<f64>::zeros(x.ncols());
        for t in &trees {
            let local_importances = t.tree.feature_importance();
            for (local, &global) in t.columns.iter().enumerate() {
                if let Some(v) = local_importances.get(local)
                    && v.is_finite()
                {
                    importances[global] += v;
                }
            }
        }
        importances /= trees.len() as f64;
        normalize(&mut importances);

        self.n_features = x.ncols();
        self.trees = trees;
        self.feature_importances = Some(importances);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(not_fitted(self.kind()));
        }
        check_width(self.kind(), self.n_features, x)?;

        let votes: Vec<Array1<usize>> = self
            .trees
            .par_iter()
            .map(|t| t.tree.predict(&x.select(Axis(1), &t.columns)))
            .collect();

        let mut positive = Array1::<f64>::zeros(x.nrows());
        for v in &votes {
            positive.zip_mut_with(v, |acc, &c| *acc += c as f64);
        }
        Ok(positive / self.trees.len() as f64)
    }

    fn feature_importances(&self) -> Result<Array1<f64>> {
        self.feature_importances
            .clone()
            .ok_or_else(|| not_fitted(self.kind()))
    }
}
