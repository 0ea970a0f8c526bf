//! End-to-end training runs.
//!
//! Nothing is written to disk until a model has been selected. The mapping
//! files, the run report and the artifact are then staged together and
//! renamed into place with the artifact last, so a run that fails in any
//! stage leaves no output of its own behind.

use crate::artifact::ModelArtifact;
use crate::config::PipelineConfig;
use crate::error::{Result, TheftcastError};
use crate::persist::StagedWrites;
use crate::preprocess::io::load_csv;
use crate::preprocess::pipeline::{Preprocessed, preprocess};
use crate::report::{CandidateSummary, RunReport, Stage, StageClock};
use crate::training::dataset::TrainingData;
use crate::training::selector::{ModelSelector, Scored as _};
use crate::training::split::train_test_split;
use crate::training::trainer::{CandidateModel, ModelTrainer};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const REPORT_FILE: &str = "run_report.json";

/// What a successful run produced and where it was written.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub artifact: ModelArtifact,
    pub artifact_path: PathBuf,
    pub mapping_paths: Vec<PathBuf>,
    pub report: RunReport,
    pub report_path: PathBuf,
}

/// Loads `path` and trains on it.
pub fn run_from_csv(path: &Path, config: &PipelineConfig) -> Result<RunOutcome> {
    let raw = load_csv(path)?;
    run_training(raw, config)
}

/// Preprocesses `raw`, trains every configured backend, keeps the best and
/// persists it together with the encoding maps and a run report.
#[instrument(skip_all, fields(rows = raw.height(), output = %config.output_dir.display()))]
pub fn run_training(raw: DataFrame, config: &PipelineConfig) -> Result<RunOutcome> {
    config.validate()?;

    let pre = preprocess(raw, config)?;
    let mut clock = StageClock::new();

    let data = TrainingData::from_preprocessed(&pre)?;
    let [n_class0, n_class1] = data.class_counts();
    info!(
        "Training on {} rows, {} features ({}: {}, {}: {})",
        data.n_samples(),
        data.n_features(),
        data.classes.first().map_or("0", String::as_str),
        n_class0,
        data.classes.get(1).map_or("1", String::as_str),
        n_class1
    );

    let split = train_test_split(&data, config.test_split_fraction, config.random_seed)?;
    let candidates = ModelTrainer::new(config).train_all(&split);
    clock.mark(Stage::Trained);

    persist_best(&pre, &data, candidates, clock, config)
}

/// Picks the best of `candidates` and persists it with the mapping files and
/// the run report.
///
/// Every file is staged first; the artifact is renamed into place last. If
/// selection or any write fails, nothing from this run is left on disk.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn persist_best(
    pre: &Preprocessed,
    data: &TrainingData,
    candidates: Vec<CandidateModel>,
    mut clock: StageClock,
    config: &PipelineConfig,
) -> Result<RunOutcome> {
    let summaries: Vec<CandidateSummary> = candidates
        .iter()
        .map(|c| CandidateSummary {
            backend: c.kind.to_string(),
            features: c.features.clone(),
            metrics: c.metrics.clone(),
            score: c.score(),
        })
        .collect();
    let winner = ModelSelector::select(candidates)?;
    clock.mark(Stage::Selected);

    let artifact = ModelArtifact::from_candidate(winner, &pre.label_column, data.classes.clone());
    let artifact_bytes = artifact.to_json_bytes()?;

    let mut files = StagedWrites::new();
    let mapping_paths = pre.stage_mappings(&config.mappings_path(), &mut files)?;
    clock.mark(Stage::Persisted);

    let mut timings = pre.timings.clone();
    timings.extend(clock.into_timings());

    let report = RunReport {
        rows_used: data.n_samples(),
        removed_label_rows: pre.removed_label_rows,
        dropped_columns: pre.dropped_columns.clone(),
        imputations: pre.imputations.clone(),
        cleanups: pre.cleanups.clone(),
        correlated_pairs: pre.pruning.pairs.clone(),
        pruned_columns: pre.pruning.dropped.clone(),
        candidates: summaries,
        chosen_backend: artifact.backend.to_string(),
        chosen_features: artifact.features.clone(),
        timings,
    };
    let report_json = serde_json::to_vec_pretty(&report).map_err(|e| {
        TheftcastError::ArtifactWrite(format!("cannot serialize run report: {e}"))
    })?;
    let report_path = config.output_dir.join(REPORT_FILE);
    files.stage(&report_path, &report_json)?;

    let artifact_path = config.artifact_path();
    files.stage(&artifact_path, &artifact_bytes)?;
    files.commit()?;

    info!(
        "Run complete in {:?}: {} on {:?}, artifact at {}",
        report.total_duration(),
        report.chosen_backend,
        report.chosen_features,
        artifact_path.display()
    );

    Ok(RunOutcome {
        artifact,
        artifact_path,
        mapping_paths,
        report,
        report_path,
    })
}
