use super::backend::{BackendKind, Classifier, TrainedModel};
use super::balance::{self, Balanced};
use super::metrics::Metrics;
use super::selection::{FeatureSelector, RankedFeature};
use super::split::TrainTestSplit;
use crate::config::PipelineConfig;
use crate::error::Result;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

/// A fitted model, the features it was fitted on and its test scores.
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub kind: BackendKind,
    pub model: TrainedModel,
    /// Feature names in the column order the model expects.
    pub features: Vec<String>,
    pub ranking: Vec<RankedFeature>,
    pub metrics: Metrics,
}

pub struct ModelTrainer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Fits `kind` on the balanced training rows restricted to `features`
    /// and scores it on the test split.
    fn fit_and_score(
        &self,
        kind: BackendKind,
        features: &[String],
        balanced: &Balanced,
        split: &TrainTestSplit,
    ) -> Result<(TrainedModel, Metrics)> {
        let train = balanced.data.select_features(features)?;
        let test = split.test.select_features(features)?;

        let mut model = kind.build(self.config);
        model.fit(
            train.x.view(),
            train.y.view(),
            balanced.weights.as_ref().map(|w| w.view()),
        )?;

        let proba = model.predict_proba(test.x.view())?;
        let predicted = model.predict(test.x.view())?;
        let metrics = Metrics::evaluate(
            &test.y.to_vec(),
            &predicted.to_vec(),
            &proba.to_vec(),
            &test.classes,
        );
        Ok((model, metrics))
    }

    /// Selects the top-K features for `kind`, then trains and scores a fresh
    /// model on them.
    #[instrument(skip(self, split), fields(backend = %kind))]
    pub fn train_candidate(&self, kind: BackendKind, split: &TrainTestSplit) -> Result<CandidateModel> {
        let balanced = balance::apply(self.config.balance, &split.train, self.config.random_seed)?;
        let mut ranker = kind.build(self.config);
        let ranking = FeatureSelector::new(self.config.top_k_features).select(
            &mut ranker,
            &balanced.data,
            balanced.weights.as_ref().map(|w| w.view()),
        )?;
        let features: Vec<String> = ranking.iter().map(|r| r.name.clone()).collect();

        let (model, metrics) = self.fit_and_score(kind, &features, &balanced, split)?;
        info!(
            "{kind}: accuracy {:.4}, weighted F1 {:.4}, AUC {:.4}",
            metrics.accuracy, metrics.f1_weighted, metrics.auc
        );
        for r in &metrics.report {
            info!(
                "{kind} [{}]: precision {:.3}, recall {:.3}, F1 {:.3}, support {}",
                r.class, r.precision, r.recall, r.f1, r.support
            );
        }

        Ok(CandidateModel {
            kind,
            model,
            features,
            ranking,
            metrics,
        })
    }

    /// Trains every configured backend in parallel.
    ///
    /// Results keep the configured order. A backend that fails is logged and
    /// left out.
    pub fn train_all(&self, split: &TrainTestSplit) -> Vec<CandidateModel> {
        let results: Vec<(BackendKind, Result<CandidateModel>)> = self
            .config
            .backends
            .par_iter()
            .map(|&kind| (kind, self.train_candidate(kind, split)))
            .collect();

        results
            .into_iter()
            .filter_map(|(kind, result)| match result {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    warn!("Dropping candidate {kind}: {e}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BalanceStrategy, BoostingParams, ForestParams};
    use crate::training::dataset::TrainingData;
    use crate::training::split::train_test_split;
    use ndarray::{Array1, Array2};

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            top_k_features: 2,
            forest: ForestParams {
                n_trees: 15,
                max_depth: 4,
                min_samples_leaf: 1,
            },
            boosting: BoostingParams {
                n_rounds: 15,
                max_depth: 3,
                ..BoostingParams::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn split() -> anyhow::Result<TrainTestSplit> {
        let n = 120;
        let x = Array2::from_shape_fn((n, 4), |(i, j)| match j {
            0 => (i % 60) as f64,
            1 => ((i * 11) % 13) as f64,
            2 => (i % 60) as f64 * 0.5 + ((i * 3) % 5) as f64,
            _ => ((i * 17) % 7) as f64,
        });
        let y = Array1::from_shape_fn(n, |i| usize::from(i % 60 >= 40));
        let names = ["A", "B", "C", "D"].map(str::to_owned).to_vec();
        let data = TrainingData::new(x, y, names, vec!["RECOVERED".into(), "STOLEN".into()])?;
        Ok(train_test_split(&data, 0.2, 42)?)
    }

    #[test]
    fn test_candidate_uses_top_k_features() -> anyhow::Result<()> {
        let config = small_config();
        let split = split()?;
        let candidate = ModelTrainer::new(&config).train_candidate(BackendKind::GradientBoosting, &split)?;

        assert_eq!(candidate.features.len(), 2);
        assert!(candidate.features.contains(&"A".to_owned()));
        assert!(candidate.metrics.accuracy > 0.8);
        assert!(candidate.metrics.auc > 0.8);
        Ok(())
    }

    #[test]
    fn test_train_all_keeps_configured_order() -> anyhow::Result<()> {
        let config = PipelineConfig {
            balance: BalanceStrategy::SmoteTomek,
            ..small_config()
        };
        let split = split()?;
        let candidates = ModelTrainer::new(&config).train_all(&split);
        let kinds: Vec<BackendKind> = candidates.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, config.backends);
        Ok(())
    }
}
