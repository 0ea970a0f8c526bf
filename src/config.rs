use crate::error::{Result, ResultExt as _, TheftcastError};
use crate::preprocess::encoding::CleanupRule;
use crate::training::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the trainer compensates for an unbalanced label column.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceStrategy {
    /// Balanced sample weights `n / (2 * n_c)` computed on the training split.
    #[default]
    ClassWeights,
    /// SMOTE oversampling of the minority class followed by Tomek-link cleaning.
    SmoteTomek,
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 10,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each round.
    pub subsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 200,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 1.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogisticParams {
    pub max_iterations: u64,
    pub alpha: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            alpha: 1.0,
        }
    }
}

/// Everything a training run needs, passed explicitly through every stage.
///
/// Missing keys in a JSON config file fall back to the defaults below, so a
/// file only has to name what it changes:
///
/// ```
/// use theftcast::config::PipelineConfig;
///
/// let config = PipelineConfig::from_json(r#"{ "top_k_features": 5 }"#).unwrap();
/// assert_eq!(config.top_k_features, 5);
/// assert_eq!(config.label_column, "STATUS");
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub label_column: String,
    /// Label values whose rows are removed before profiling.
    pub excluded_labels: Vec<String>,
    /// Columns dropped outright before profiling, if present.
    pub dropped_columns: Vec<String>,
    pub cleanup_rules: Vec<CleanupRule>,
    pub correlation_threshold: f64,
    pub top_k_features: usize,
    pub test_split_fraction: f64,
    pub random_seed: u64,
    pub balance: BalanceStrategy,
    /// Candidate backends, in the order they are compared.
    pub backends: Vec<BackendKind>,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    pub logistic: LogisticParams,
    pub output_dir: PathBuf,
    pub artifact_name: String,
    /// Directory for `mapping_<column>.csv` files, relative to `output_dir`.
    pub mappings_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label_column: "STATUS".to_owned(),
            excluded_labels: vec!["UNKNOWN".to_owned()],
            dropped_columns: vec!["BIKE_MODEL".to_owned()],
            cleanup_rules: CleanupRule::defaults(),
            correlation_threshold: 0.75,
            top_k_features: 10,
            test_split_fraction: 0.2,
            random_seed: 42,
            balance: BalanceStrategy::default(),
            backends: vec![
                BackendKind::GradientBoosting,
                BackendKind::RandomForest,
                BackendKind::LogisticRegression,
            ],
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            logistic: LogisticParams::default(),
            output_dir: PathBuf::from("output"),
            artifact_name: "best_model.json".to_owned(),
            mappings_dir: PathBuf::from("mappings"),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.artifact_name)
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.output_dir.join(&self.mappings_dir)
    }

    /// Rejects values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TheftcastError::Config(msg));

        if self.label_column.trim().is_empty() {
            return fail("label_column must not be empty".to_owned());
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return fail(format!(
                "correlation_threshold must be within [0, 1], got {}",
                self.correlation_threshold
            ));
        }
        if self.top_k_features == 0 {
            return fail("top_k_features must be at least 1".to_owned());
        }
        if !(self.test_split_fraction > 0.0 && self.test_split_fraction < 1.0) {
            return fail(format!(
                "test_split_fraction must be strictly between 0 and 1, got {}",
                self.test_split_fraction
            ));
        }
        if self.backends.is_empty() {
            return fail("at least one backend must be configured".to_owned());
        }
        if self.forest.n_trees == 0 || self.forest.max_depth == 0 {
            return fail("forest needs at least one tree of depth >= 1".to_owned());
        }
        if self.boosting.n_rounds == 0 || self.boosting.max_depth == 0 {
            return fail("boosting needs at least one round of depth >= 1".to_owned());
        }
        if !(self.boosting.learning_rate > 0.0 && self.boosting.learning_rate <= 1.0) {
            return fail(format!(
                "boosting.learning_rate must be within (0, 1], got {}",
                self.boosting.learning_rate
            ));
        }
        if !(self.boosting.subsample > 0.0 && self.boosting.subsample <= 1.0) {
            return fail(format!(
                "boosting.subsample must be within (0, 1], got {}",
                self.boosting.subsample
            ));
        }
        if self.logistic.max_iterations == 0 {
            return fail("logistic.max_iterations must be at least 1".to_owned());
        }
        if self.artifact_name.trim().is_empty() {
            return fail("artifact_name must not be empty".to_owned());
        }
        Ok(())
    }
}
