//! Turns a raw incident table into a model-ready, fully numeric table.
//!
//! The stages run strictly in order and each one hands a [`DataFrame`] to the
//! next:
//!
//! 1. [`io`]: load the CSV, drop excluded label rows and sparse columns
//! 2. [`profiling`]: assign a [`ColumnKind`] to every column and record stats
//! 3. [`imputation`]: fill missing values (KS-tested mean/median, or mode)
//! 4. [`encoding`]: clean known junk values, then label-encode categoricals
//! 5. [`correlation`]: drop redundant columns from over-threshold pairs
//!
//! [`pipeline::preprocess`] wires them together.
//!
//! [`DataFrame`]: polars::prelude::DataFrame

pub mod correlation;
pub mod encoding;
pub mod imputation;
pub mod io;
pub mod pipeline;
pub mod profiling;
pub mod stats;
pub mod types;

pub use encoding::{CleanupRule, EncodingMap};
pub use imputation::{ImputationRecord, ImputationStrategy};
pub use pipeline::{Preprocessed, preprocess};
pub use types::{ColumnKind, ColumnStats, CorrelationPair, TableProfile};
