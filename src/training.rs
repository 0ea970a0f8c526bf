//! Candidate training, evaluation and selection.
//!
//! Each configured [`BackendKind`] becomes one candidate. For every candidate
//! the [`FeatureSelector`](selection::FeatureSelector) fits the backend on all
//! features of the training split and keeps the top-K by importance, then the
//! [`ModelTrainer`](trainer::ModelTrainer) fits a fresh model of the same kind
//! on those features and scores it on the test split. The
//! [`ModelSelector`](selector::ModelSelector) picks the winner.

pub mod backend;
pub mod balance;
pub mod boosting;
pub mod dataset;
pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod selection;
pub mod selector;
pub mod split;
pub mod trainer;
pub mod tree;

pub use backend::{BackendKind, Classifier, TrainedModel};
pub use dataset::TrainingData;
pub use metrics::Metrics;
pub use selector::ModelSelector;
pub use trainer::{CandidateModel, ModelTrainer};
