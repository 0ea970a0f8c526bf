//! # theftcast - Bicycle Theft Recovery Modelling
//!
//! theftcast turns a raw table of theft incidents into a deployable binary
//! classifier that predicts whether a stolen bicycle will be recovered.
//!
//! ## Quick Start
//!
//! ```no_run
//! use theftcast::config::PipelineConfig;
//! use theftcast::run::run_from_csv;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::default();
//! let outcome = run_from_csv("thefts.csv".as_ref(), &config)?;
//! println!("{} on {:?}", outcome.artifact.backend, outcome.artifact.features);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`preprocess`]: profiling, imputation, encoding and correlation pruning
//! - [`training`]: classifiers, feature selection, evaluation and model choice
//! - [`artifact`]: the persisted model and inference on single records
//! - [`run`]: the end-to-end batch run
//! - [`persist`]: all-or-nothing output of a run's files
//! - [`config`]: the run configuration
//! - [`error`]: error types and handling utilities
//! - [`logging`]: console and rolling file logs
//! - [`report`]: stage timings and decisions of a run
//!
//! ## Data Flow
//!
//! ```text
//! raw CSV -> preprocess -> per backend { select top-K, fit, evaluate }
//!         -> select best -> artifact + mapping files + run report
//! ```
//!
//! Every stage returns [`error::Result`]. Output files are staged and renamed
//! into place together, so a failed run leaves none of them behind.

#![warn(clippy::all, rust_2018_idioms)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod logging;
pub mod persist;
pub mod preprocess;
pub mod report;
pub mod run;
pub mod training;
