use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use theftcast::artifact::ModelArtifact;
use theftcast::config::PipelineConfig;
use theftcast::preprocess::io::{load_csv, save_csv};
use theftcast::preprocess::pipeline::preprocess;
use theftcast::preprocess::profiling::profile;
use theftcast::run::run_from_csv;

#[derive(Parser)]
#[command(name = "theftcast", about = "Bicycle theft recovery model trainer")]
pub struct Cli {
    /// Directory for log files. Defaults to the platform data directory.
    #[arg(long, global = true, env = "THEFTCAST_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preprocess a CSV, train every backend and persist the best model
    Train {
        /// Path to the incident CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Path to a JSON pipeline configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overrides the configured output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Write the model-ready table and its mapping files without training
    Preprocess {
        /// Path to the incident CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the preprocessed CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Path to a JSON pipeline configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the kind and statistics of every column
    Profile {
        /// Path to the CSV to profile
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Score one record with a saved artifact
    Predict {
        /// Path to a model artifact written by `train`
        #[arg(short, long)]
        artifact: PathBuf,

        /// A JSON object of feature name to value, or a path to a file holding one
        #[arg(short, long)]
        input: String,
    },
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Train {
            input,
            config,
            output_dir,
        } => handle_train(&input, config.as_deref(), output_dir),
        Commands::Preprocess {
            input,
            output,
            config,
        } => handle_preprocess(&input, &output, config.as_deref()),
        Commands::Profile { input } => handle_profile(&input),
        Commands::Predict { artifact, input } => handle_predict(&artifact, &input),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => {
            println!("Loading config from {}...", p.display());
            PipelineConfig::from_file(p)
                .with_context(|| format!("Invalid configuration in {}", p.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn handle_train(input: &Path, config_path: Option<&Path>, output_dir: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    println!("Training on {}...", input.display());
    let outcome = run_from_csv(input, &config).context("Training run failed")?;

    for c in &outcome.report.candidates {
        println!(
            "  {:<20} score {:.4}  (accuracy {:.4}, weighted F1 {:.4}, AUC {:.4})",
            c.backend, c.score, c.metrics.accuracy, c.metrics.f1_weighted, c.metrics.auc
        );
    }
    println!(
        "Selected {} on features: {}",
        outcome.artifact.backend,
        outcome.artifact.features.join(", ")
    );
    println!("Artifact written to: {}", outcome.artifact_path.display());
    println!(
        "{} mapping file(s) written to: {}",
        outcome.mapping_paths.len(),
        config.mappings_path().display()
    );
    println!("Run report written to: {}", outcome.report_path.display());
    Ok(())
}

fn handle_preprocess(input: &Path, output: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    println!("Preprocessing {}...", input.display());
    let raw = load_csv(input)?;
    let mut pre = preprocess(raw, &config)?;

    save_csv(&mut pre.table, output)?;
    let mapping_dir = output
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&config.mappings_dir);
    let written = pre.save_mappings(&mapping_dir)?;

    if !pre.pruning.dropped.is_empty() {
        println!("Pruned correlated columns: {}", pre.pruning.dropped.join(", "));
    }
    println!(
        "Wrote {} rows x {} columns to {}",
        pre.table.height(),
        pre.table.width(),
        output.display()
    );
    println!("{} mapping file(s) written to: {}", written.len(), mapping_dir.display());
    Ok(())
}

fn handle_profile(input: &Path) -> Result<()> {
    let mut df = load_csv(input)?;
    let table = profile(&mut df)?;

    println!("{} rows, {} columns", table.row_count, table.column_count());
    println!(
        "{:<28} {:<12} {:>8} {:>8} {:>12}",
        "column", "kind", "missing", "missing%", "card/var"
    );
    for c in &table.columns {
        let spread = match (c.cardinality, c.variance) {
            (Some(card), _) => card.to_string(),
            (None, Some(var)) => format!("{var:.4}"),
            (None, None) => "-".to_owned(),
        };
        println!(
            "{:<28} {:<12} {:>8} {:>7.2}% {:>12}",
            c.name,
            c.kind.as_str(),
            c.missing,
            c.missing_pct(),
            spread
        );
    }
    Ok(())
}

fn handle_predict(artifact_path: &Path, input: &str) -> Result<()> {
    let artifact = ModelArtifact::load(artifact_path)
        .with_context(|| format!("Failed to load artifact {}", artifact_path.display()))?;

    let json = if Path::new(input).is_file() {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?
    } else {
        input.to_owned()
    };
    let record: HashMap<String, f64> =
        serde_json::from_str(&json).context("Input must be a JSON object of numbers")?;

    let proba = artifact.predict_proba(&record)?;
    let label = artifact.predict_label(&record)?;
    println!("{proba:.6}");
    println!("predicted {}: {label}", artifact.label_column);
    Ok(())
}
