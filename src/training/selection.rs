use super::backend::{Classifier, TrainedModel};
use super::dataset::TrainingData;
use crate::error::{Result, TheftcastError};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedFeature {
    pub name: String,
    pub importance: f64,
}

/// Keeps the `top_k` most important features under a fitted model.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSelector {
    pub top_k: usize,
}

impl FeatureSelector {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Fits `model` once on every feature of `train` and ranks them.
    ///
    /// Returns at most `top_k` features, most important first; equal
    /// importances keep their column order.
    pub fn select(
        &self,
        model: &mut TrainedModel,
        train: &TrainingData,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<Vec<RankedFeature>> {
        model.fit(train.x.view(), train.y.view(), weights)?;
        let importances = model.feature_importances()?;
        if importances.len() != train.n_features() {
            return Err(TheftcastError::Training(format!(
                "{} returned {} importances for {} features",
                model.kind(),
                importances.len(),
                train.n_features()
            )));
        }

        let ranked = rank(&train.feature_names, &importances.to_vec(), self.top_k);
        for f in &ranked {
            debug!("{}: {} importance {:.4}", model.kind(), f.name, f.importance);
        }
        info!(
            "{} selected {} of {} features",
            model.kind(),
            ranked.len(),
            train.n_features()
        );
        Ok(ranked)
    }
}

/// Stable descending sort by importance, truncated to `k`.
pub fn rank(names: &[String], importances: &[f64], k: usize) -> Vec<RankedFeature> {
    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(importances)
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance: if importance.is_finite() { importance } else { 0.0 },
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(k);
    ranked
}
