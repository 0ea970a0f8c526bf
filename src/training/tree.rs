//! Second-order regression tree used as the boosting weak learner.
//!
//! Each row carries a gradient `g` and hessian `h` of the loss. A split is
//! scored by `GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ)` and a leaf predicts
//! `G/(H+λ)`, the Newton step for the rows it holds.

use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values.
    pub lambda: f64,
}

/// A fitted tree; nodes are stored flat with the root at index 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grows a tree over the rows in `rows`.
    ///
    /// `importances` (one slot per column of `x`) accumulates the gain of
    /// every split made.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        params: TreeParams,
        importances: &mut [f64],
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            n_features: x.ncols(),
        };
        tree.grow(x, grad, hess, rows.to_vec(), 0, params, importances);
        tree
    }

    #[expect(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        grad: &[f64],
        hess: &[f64],
        rows: Vec<usize>,
        depth: usize,
        params: TreeParams,
        importances: &mut [f64],
    ) -> usize {
        let g: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| hess[i]).sum();
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: g / (h + params.lambda),
        });

        if depth >= params.max_depth || rows.len() < 2 * params.min_samples_leaf.max(1) {
            return id;
        }
        let Some(best) = best_split(x, grad, hess, &rows, g, h, params) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| x[[i, best.feature]] <= best.threshold);
        if let Some(slot) = importances.get_mut(best.feature) {
            *slot += best.gain;
        }

        let left = self.grow(x, grad, hess, left_rows, depth + 1, params, importances);
        let right = self.grow(x, grad, hess, right_rows, depth + 1, params, importances);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict_row(&self, row: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|r| self.predict_row(|j| r[j]))
            .collect()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

/// Best split over all features; ties keep the lowest feature index.
fn best_split(
    x: ArrayView2<'_, f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    g_total: f64,
    h_total: f64,
    params: TreeParams,
) -> Option<SplitCandidate> {
    let parent = score(g_total, h_total, params.lambda);
    let min_leaf = params.min_samples_leaf.max(1);

    let per_feature: Vec<Option<SplitCandidate>> = (0..x.ncols())
        .into_par_iter()
        .map(|feature| {
            let mut order = rows.to_vec();
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut best: Option<SplitCandidate> = None;
            let (mut gl, mut hl) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                gl += grad[i];
                hl += hess[i];
                let left_n = k + 1;
                if left_n < min_leaf || order.len() - left_n < min_leaf {
                    continue;
                }
                let here = x[[i, feature]];
                let next = x[[order[k + 1], feature]];
                if next <= here {
                    continue;
                }
                let gain = score(gl, hl, params.lambda)
                    + score(g_total - gl, h_total - hl, params.lambda)
                    - parent;
                if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
            best
        })
        .collect();

    per_feature
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
            Some(a) if a.gain >= cand.gain => Some(a),
            _ => Some(cand),
        })
}
