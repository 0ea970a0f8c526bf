//! Integration tests for full training runs
//!
//! Each test writes a synthetic incident CSV into a temporary directory and
//! drives the public API from there.

#![expect(clippy::unwrap_used)]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use theftcast::artifact::ModelArtifact;
use theftcast::config::{BoostingParams, ForestParams, PipelineConfig};
use theftcast::error::TheftcastError;
use theftcast::preprocess::ImputationStrategy;
use theftcast::preprocess::io::load_csv;
use theftcast::preprocess::pipeline::preprocess;
use theftcast::report::StageClock;
use theftcast::run::{REPORT_FILE, persist_best, run_from_csv};
use theftcast::training::dataset::TrainingData;

const ROWS: usize = 400;

/// Columns: `A` right-skewed with 5% missing, `A_PRIME` nearly `2 * A`,
/// `B` three colours, `C` noise, `BIKE_MODEL` empty, `STATUS` the label.
fn write_incidents(dir: &Path) -> PathBuf {
    let mut csv = String::from("A,A_PRIME,B,C,BIKE_MODEL,STATUS\n");
    for i in 0..ROWS {
        let u = (((i * 37) % ROWS) as f64 + 0.5) / ROWS as f64;
        let a = (3.0 * u).exp();
        let a_prime = 2.0 * a + 0.01 * ((i * 7) % 5) as f64;
        let colour = ["red", "blue", "green"][i % 3];
        let noise = ((i * 13) % 17) as f64;
        let status = if i % 50 == 13 {
            "UNKNOWN"
        } else if u > 0.6 || (colour == "green" && u > 0.45) {
            "RECOVERED"
        } else {
            "STOLEN"
        };
        let a_field = if i % 20 == 7 { String::new() } else { format!("{a:.4}") };
        writeln!(csv, "{a_field},{a_prime:.4},{colour},{noise},,{status}").unwrap();
    }
    let path = dir.join("thefts.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn quick_config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        forest: ForestParams {
            n_trees: 25,
            max_depth: 6,
            min_samples_leaf: 1,
        },
        boosting: BoostingParams {
            n_rounds: 30,
            max_depth: 3,
            ..BoostingParams::default()
        },
        output_dir: output_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_end_to_end_prunes_correlated_twin() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_incidents(dir.path());
    let config = quick_config(&dir.path().join("out"));

    let outcome = run_from_csv(&input, &config)?;
    let report = &outcome.report;

    assert_eq!(report.removed_label_rows, 8);
    assert_eq!(report.rows_used, ROWS - 8);
    assert_eq!(report.dropped_columns, vec!["BIKE_MODEL".to_owned()]);
    assert_eq!(report.pruned_columns, vec!["A_PRIME".to_owned()]);

    let a_fill = report
        .imputations
        .iter()
        .find(|r| r.column == "A")
        .unwrap();
    assert_eq!(a_fill.strategy, ImputationStrategy::Median);
    assert_eq!(a_fill.filled, 20);

    let features = &outcome.artifact.features;
    assert!(!features.contains(&"A_PRIME".to_owned()));
    assert!(!features.contains(&"STATUS".to_owned()));
    assert!(features.contains(&"A".to_owned()));
    assert_eq!(outcome.artifact.classes, vec!["RECOVERED", "STOLEN"]);
    assert_eq!(report.candidates.len(), config.backends.len());
    assert_eq!(report.chosen_backend, outcome.artifact.backend.to_string());

    assert!(outcome.artifact_path.is_file());
    assert!(outcome.report_path.ends_with(REPORT_FILE));
    assert!(outcome.report_path.is_file());
    let mappings = config.mappings_path();
    assert!(mappings.join("mapping_STATUS.csv").is_file());
    assert!(mappings.join("mapping_B.csv").is_file());
    Ok(())
}

#[test]
fn test_same_seed_same_model() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_incidents(dir.path());

    let first = run_from_csv(&input, &quick_config(&dir.path().join("run1")))?;
    let second = run_from_csv(&input, &quick_config(&dir.path().join("run2")))?;

    assert_eq!(first.artifact.features, second.artifact.features);
    assert_eq!(first.artifact.backend, second.artifact.backend);
    assert_eq!(first.artifact.metrics, second.artifact.metrics);
    for (a, b) in first.report.candidates.iter().zip(&second.report.candidates) {
        assert_eq!(a.metrics, b.metrics);
    }
    Ok(())
}

#[test]
fn test_artifact_serves_predictions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_incidents(dir.path());
    let outcome = run_from_csv(&input, &quick_config(&dir.path().join("out")))?;

    let artifact = ModelArtifact::load(&outcome.artifact_path)?;
    assert_eq!(artifact.features, outcome.artifact.features);

    let record: HashMap<String, f64> = artifact
        .features
        .iter()
        .map(|f| (f.clone(), 1.0))
        .collect();
    let p = artifact.predict_proba(&record)?;
    assert!((0.0..=1.0).contains(&p));

    let mut partial = record.clone();
    let removed = artifact.features[0].clone();
    partial.remove(&removed);
    match artifact.predict_proba(&partial) {
        Err(TheftcastError::MissingFeatures(names)) => assert_eq!(names, vec![removed]),
        other => panic!("expected MissingFeatures, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_missing_label_writes_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_incidents(dir.path());
    let out = dir.path().join("out");
    let config = PipelineConfig {
        label_column: "RECOVERED_FLAG".to_owned(),
        ..quick_config(&out)
    };

    let err = run_from_csv(&input, &config).unwrap_err();
    assert!(matches!(err, TheftcastError::MissingLabelColumn(_)));
    assert!(!out.exists());
    Ok(())
}

#[test]
fn test_blocked_report_leaves_no_artifact_or_mappings() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_incidents(dir.path());
    let out = dir.path().join("out");
    let config = quick_config(&out);
    // A directory where the report should go makes its rename fail
    std::fs::create_dir_all(out.join(REPORT_FILE).join("occupied"))?;

    let err = run_from_csv(&input, &config).unwrap_err();
    assert!(matches!(err, TheftcastError::ArtifactWrite(_)));
    assert!(!config.artifact_path().exists());
    assert!(!config.mappings_path().exists());
    let left: Vec<PathBuf> = std::fs::read_dir(&out)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    assert_eq!(left, vec![out.join(REPORT_FILE)]);
    Ok(())
}

#[test]
fn test_no_candidates_writes_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = write_incidents(dir.path());
    let out = dir.path().join("out");
    let config = quick_config(&out);

    let pre = preprocess(load_csv(&input)?, &config)?;
    let data = TrainingData::from_preprocessed(&pre)?;
    let err = persist_best(&pre, &data, Vec::new(), StageClock::new(), &config).unwrap_err();

    assert!(matches!(err, TheftcastError::NoCandidates));
    assert!(!out.exists());
    Ok(())
}
