//! The deployable unit: a fitted model plus the ordered features it expects.
//!
//! Artifacts are JSON so serving code in any language can read the feature
//! list; the model state is only meaningful to this crate.

use crate::error::{Result, TheftcastError};
use crate::persist::StagedWrites;
use crate::training::backend::{BackendKind, Classifier, TrainedModel};
use crate::training::metrics::Metrics;
use crate::training::trainer::CandidateModel;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Bumped whenever the on-disk layout changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_utc: DateTime<Utc>,
    pub backend: BackendKind,
    pub label_column: String,
    /// Label values for classes 0 and 1.
    pub classes: Vec<String>,
    /// Feature names in the order `predict_proba` consumes them.
    pub features: Vec<String>,
    pub metrics: Metrics,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn from_candidate(candidate: CandidateModel, label_column: &str, classes: Vec<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_utc: Utc::now(),
            backend: candidate.kind,
            label_column: label_column.to_owned(),
            classes,
            features: candidate.features,
            metrics: candidate.metrics,
            model: candidate.model,
        }
    }

    /// Serialized form written to disk.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| TheftcastError::ArtifactWrite(format!("cannot serialize artifact: {e}")))
    }

    /// Writes the artifact to `path` atomically.
    ///
    /// On failure any existing artifact at `path` is left untouched and no
    /// temporary file remains.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_json_bytes()?;
        let mut files = StagedWrites::new();
        files.stage(path, &bytes)?;
        files.commit()?;

        info!(
            size_bytes = bytes.len(),
            backend = %self.backend,
            n_features = self.features.len(),
            "artifact written"
        );
        Ok(())
    }

    /// Reads an artifact and checks its format version.
    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&content)?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(TheftcastError::Config(format!(
                "Artifact {} has format version {}, expected {FORMAT_VERSION}",
                path.display(),
                artifact.format_version
            )));
        }
        debug!(backend = %artifact.backend, "artifact loaded");
        Ok(artifact)
    }

    /// Orders `record` by the artifact's feature list.
    ///
    /// Every feature must be present; extra keys are ignored.
    pub fn feature_vector(&self, record: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let missing: Vec<String> = self
            .features
            .iter()
            .filter(|f| !record.contains_key(*f))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TheftcastError::MissingFeatures(missing));
        }
        Ok(self
            .features
            .iter()
            .filter_map(|f| record.get(f).copied())
            .collect())
    }

    /// Probability of class 1 (`classes[1]`) for one record.
    pub fn predict_proba(&self, record: &HashMap<String, f64>) -> Result<f64> {
        let row = self.feature_vector(record)?;
        let x = Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| TheftcastError::Training(format!("Bad feature row: {e}")))?;
        let proba = self.model.predict_proba(x.view())?;
        proba
            .first()
            .copied()
            .ok_or_else(|| TheftcastError::Training("model returned no prediction".to_owned()))
    }

    /// The predicted label value for one record.
    pub fn predict_label(&self, record: &HashMap<String, f64>) -> Result<String> {
        let p = self.predict_proba(record)?;
        let class = usize::from(p >= 0.5);
        self.classes
            .get(class)
            .cloned()
            .ok_or_else(|| TheftcastError::InvalidLabel(format!("no label for class {class}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoostingParams, PipelineConfig};
    use crate::persist::temp_path;
    use ndarray::Array1;

    fn artifact() -> anyhow::Result<ModelArtifact> {
        let config = PipelineConfig {
            boosting: BoostingParams {
                n_rounds: 10,
                max_depth: 2,
                ..BoostingParams::default()
            },
            ..PipelineConfig::default()
        };
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(40, |i| usize::from(i >= 20));
        let mut model = BackendKind::GradientBoosting.build(&config);
        model.fit(x.view(), y.view(), None)?;

        let candidate = CandidateModel {
            kind: BackendKind::GradientBoosting,
            model,
            features: vec!["BIKE_COST".to_owned(), "PREMISES_TYPE".to_owned()],
            ranking: Vec::new(),
            metrics: Metrics {
                accuracy: 1.0,
                f1_weighted: 1.0,
                auc: 1.0,
                report: Vec::new(),
            },
        };
        Ok(ModelArtifact::from_candidate(
            candidate,
            "STATUS",
            vec!["RECOVERED".to_owned(), "STOLEN".to_owned()],
        ))
    }

    fn record(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    #[test]
    fn test_write_then_load() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("best_model.json");
        let original = artifact()?;
        original.write(&path)?;

        assert!(!temp_path(&path).exists());
        let loaded = ModelArtifact::load(&path)?;
        assert_eq!(loaded.features, original.features);
        assert_eq!(loaded.backend, BackendKind::GradientBoosting);

        let r = record(&[("BIKE_COST", 35.0), ("PREMISES_TYPE", 1.0), ("EXTRA", 9.0)]);
        assert_eq!(loaded.predict_proba(&r)?, original.predict_proba(&r)?);
        assert_eq!(loaded.predict_label(&r)?, "STOLEN");
        Ok(())
    }

    #[test]
    fn test_missing_features_named() -> anyhow::Result<()> {
        let artifact = artifact()?;
        let err = artifact.predict_proba(&record(&[("BIKE_COST", 1.0)])).unwrap_err();
        match err {
            TheftcastError::MissingFeatures(names) => assert_eq!(names, vec!["PREMISES_TYPE"]),
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_no_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // A directory where the artifact should go makes the rename fail
        let path = dir.path().join("best_model.json");
        std::fs::create_dir_all(path.join("occupied"))?;

        let err = artifact()?.write(&path).unwrap_err();
        assert!(matches!(err, TheftcastError::ArtifactWrite(_)));
        assert!(!temp_path(&path).exists());
        assert!(path.is_dir());
        Ok(())
    }

    #[test]
    fn test_version_mismatch_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("old.json");
        let mut old = artifact()?;
        old.format_version = FORMAT_VERSION + 1;
        old.write(&path)?;
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(TheftcastError::Config(_))
        ));
        Ok(())
    }
}
