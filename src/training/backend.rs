use super::boosting::GradientBoosting;
use super::forest::RandomForest;
use super::logistic::LogisticModel;
use crate::config::PipelineConfig;
use crate::error::{Result, TheftcastError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// A binary classifier the trainer can fit, score and persist.
///
/// Labels are class indices 0 and 1; `predict_proba` returns the probability
/// of class 1 for every row.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fits on `x`/`y`; `weights`, when given, are per-sample weights.
    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<()>;

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<usize>> {
        Ok(self.predict_proba(x)?.mapv(|p| usize::from(p >= 0.5)))
    }

    /// One non-negative score per feature column of the training matrix.
    fn feature_importances(&self) -> Result<Array1<f64>>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BackendKind {
    RandomForest,
    GradientBoosting,
    LogisticRegression,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomForest => "RandomForest",
            Self::GradientBoosting => "GradientBoosting",
            Self::LogisticRegression => "LogisticRegression",
        }
    }

    /// An unfitted model of this kind, configured from `config`.
    pub fn build(&self, config: &PipelineConfig) -> TrainedModel {
        match self {
            Self::RandomForest => {
                TrainedModel::RandomForest(RandomForest::new(config.forest.clone(), config.random_seed))
            }
            Self::GradientBoosting => TrainedModel::GradientBoosting(GradientBoosting::new(
                config.boosting.clone(),
                config.random_seed,
            )),
            Self::LogisticRegression => {
                TrainedModel::LogisticRegression(LogisticModel::new(config.logistic.clone()))
            }
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = TheftcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "randomforest" | "forest" | "rf" => Ok(Self::RandomForest),
            "gradientboosting" | "boosting" | "gbm" => Ok(Self::GradientBoosting),
            "logisticregression" | "logistic" | "lr" => Ok(Self::LogisticRegression),
            _ => Err(TheftcastError::Config(format!("Unknown backend: {s}"))),
        }
    }
}

/// Any backend, fitted or not. This is what the artifact stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", content = "state")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    LogisticRegression(LogisticModel),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
            Self::LogisticRegression(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Self::RandomForest(m) => m,
            Self::GradientBoosting(m) => m,
            Self::LogisticRegression(m) => m,
        }
    }
}

impl Classifier for TrainedModel {
    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        self.inner_mut().fit(x, y, weights)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        self.inner().predict_proba(x)
    }

    fn feature_importances(&self) -> Result<Array1<f64>> {
        self.inner().feature_importances()
    }
}

/// Shared input checks for every backend's `fit`.
pub(crate) fn check_fit_input(
    kind: BackendKind,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, usize>,
    weights: Option<ArrayView1<'_, f64>>,
) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(TheftcastError::Training(format!(
            "{kind}: cannot fit on a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(TheftcastError::Training(format!(
            "{kind}: {} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(w) = weights
        && w.len() != y.len()
    {
        return Err(TheftcastError::Training(format!(
            "{kind}: {} weights for {} rows",
            w.len(),
            y.len()
        )));
    }
    Ok(())
}

pub(crate) fn not_fitted(kind: BackendKind) -> TheftcastError {
    TheftcastError::Training(format!("{kind} model has not been fitted"))
}

pub(crate) fn check_width(kind: BackendKind, expected: usize, x: ArrayView2<'_, f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TheftcastError::Training(format!(
            "{kind}: expected {expected} feature columns, got {}",
            x.ncols()
        )));
    }
    Ok(())
}

/// Scales `values` to sum to one; all-zero input stays zero.
pub(crate) fn normalize(values: &mut Array1<f64>) {
    let total = values.sum();
    if total > 0.0 {
        values.mapv_inplace(|v| v / total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("random-forest".parse::<BackendKind>().ok(), Some(BackendKind::RandomForest));
        assert_eq!("GBM".parse::<BackendKind>().ok(), Some(BackendKind::GradientBoosting));
        assert_eq!(
            "logistic_regression".parse::<BackendKind>().ok(),
            Some(BackendKind::LogisticRegression)
        );
        assert!("svm".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_build_matches_kind() {
        let config = PipelineConfig::default();
        for kind in [
            BackendKind::RandomForest,
            BackendKind::GradientBoosting,
            BackendKind::LogisticRegression,
        ] {
            assert_eq!(kind.build(&config).kind(), kind);
        }
    }

    #[test]
    fn test_unfitted_model_refuses_to_predict() {
        let model = BackendKind::GradientBoosting.build(&PipelineConfig::default());
        let x = ndarray::Array2::<f64>::zeros((2, 3));
        assert!(model.predict_proba(x.view()).is_err());
        assert!(model.feature_importances().is_err());
    }
}
