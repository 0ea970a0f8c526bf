use super::backend::{BackendKind, Classifier, check_fit_input, check_width, normalize, not_fitted};
use super::boosting::sigmoid;
use crate::config::LogisticParams;
use crate::error::{Result, TheftcastError};
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Fitted {
    means: Array1<f64>,
    scales: Array1<f64>,
    /// Coefficients on the standardized features, oriented to class 1.
    coefficients: Array1<f64>,
    intercept: f64,
}

/// L2-regularized logistic regression on standardized features.
///
/// Importance of a feature is the magnitude of its standardized coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    params: LogisticParams,
    fitted: Option<Fitted>,
}

impl LogisticModel {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    fn standardize(x: ArrayView2<'_, f64>, means: &Array1<f64>, scales: &Array1<f64>) -> Array2<f64> {
        let mut z = x.to_owned();
        for mut row in z.rows_mut() {
            row -= means;
            row /= scales;
        }
        z
    }
}

impl Classifier for LogisticModel {
    fn kind(&self) -> BackendKind {
        BackendKind::LogisticRegression
    }

    fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        check_fit_input(self.kind(), x, y, weights)?;
        if weights.is_some() {
            info!("Logistic regression does not take sample weights; fitting unweighted");
        }

        let means = x
            .mean_axis(Axis(0))
            .ok_or_else(|| TheftcastError::Training("empty feature matrix".to_owned()))?;
        let scales = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        let z = Self::standardize(x, &means, &scales);

        let dataset = Dataset::new(z.clone(), y.to_owned());
        let model = LogisticRegression::default()
            .max_iterations(self.params.max_iterations)
            .alpha(self.params.alpha)
            .fit(&dataset)
            .map_err(|e| TheftcastError::Training(format!("Logistic Regression training failed: {e}")))?;

        // Orient the coefficients so that sigmoid(z·w + b) is P(class 1),
        // whichever label the backend treats as positive.
        let labels = model.predict(&z);
        let probs = model.predict_probabilities(&z);
        let agree = labels
            .iter()
            .zip(probs.iter())
            .filter(|(l, p)| (**l == 1) == (**p >= 0.5))
            .count();
        let sign = if agree * 2 >= labels.len() { 1.0 } else { -1.0 };

        self.fitted = Some(Fitted {
            means,
            scales,
            coefficients: model.params().mapv(|w| sign * w),
            intercept: sign * model.intercept(),
        });
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(self.kind()))?;
        check_width(self.kind(), fitted.coefficients.len(), x)?;
        let z = Self::standardize(x, &fitted.means, &fitted.scales);
        Ok(z.dot(&fitted.coefficients).mapv(|s| sigmoid(s + fitted.intercept)))
    }

    fn feature_importances(&self) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(self.kind()))?;
        let mut importances = fitted.coefficients.mapv(f64::abs);
        normalize(&mut importances);
        Ok(importances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logistic_orientation_and_importance() -> anyhow::Result<()> {
        let n = 60;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 { i as f64 * 10.0 } else { ((i * 13) % 4) as f64 }
        });
        // Class 1 at the low end, so a naive orientation would be inverted
        let y = Array1::from_shape_fn(n, |i| usize::from(i < 25));

        let mut model = LogisticModel::new(LogisticParams::default());
        model.fit(x.view(), y.view(), None)?;

        let proba = model.predict_proba(x.view())?;
        assert!(proba[0] > 0.5);
        assert!(proba[n - 1] < 0.5);
        let accuracy = model
            .predict(x.view())?
            .iter()
            .zip(y.iter())
            .filter(|(a, b)| a == b)
            .count() as f64
            / n as f64;
        assert!(accuracy > 0.9);

        let imp = model.feature_importances()?;
        assert!(imp[0] > imp[1]);
        Ok(())
    }

    #[test]
    fn test_weights_are_accepted() -> anyhow::Result<()> {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| usize::from(i >= 10));
        let w = Array1::from_elem(20, 2.0);
        let mut model = LogisticModel::new(LogisticParams::default());
        model.fit(x.view(), y.view(), Some(w.view()))?;
        assert!(model.predict_proba(x.view())?[19] > 0.5);
        Ok(())
    }
}
