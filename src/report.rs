//! Run bookkeeping: which stages ran, how long they took, what they decided.

use crate::preprocess::encoding::CleanupRecord;
use crate::preprocess::imputation::ImputationRecord;
use crate::preprocess::types::CorrelationPair;
use crate::training::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Stages of a training run, in the order they happen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Stage {
    Loaded,
    Profiled,
    Imputed,
    Encoded,
    Pruned,
    Trained,
    Selected,
    Persisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Profiled => "profiled",
            Self::Imputed => "imputed",
            Self::Encoded => "encoded",
            Self::Pruned => "pruned",
            Self::Trained => "trained",
            Self::Selected => "selected",
            Self::Persisted => "persisted",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration: Duration,
}

/// Records the time since the previous mark for each stage reached.
#[derive(Debug)]
pub struct StageClock {
    last: Instant,
    timings: Vec<StageTiming>,
}

impl Default for StageClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StageClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            timings: Vec::new(),
        }
    }

    pub fn mark(&mut self, stage: Stage) {
        let now = Instant::now();
        let duration = now.duration_since(self.last);
        tracing::debug!("Stage {stage} finished in {duration:?}");
        self.timings.push(StageTiming { stage, duration });
        self.last = now;
    }

    pub fn into_timings(self) -> Vec<StageTiming> {
        self.timings
    }
}

/// Metrics of one candidate backend, as compared by the selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateSummary {
    pub backend: String,
    pub features: Vec<String>,
    pub metrics: Metrics,
    pub score: f64,
}

/// Everything a finished run decided, written next to the artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub rows_used: usize,
    pub removed_label_rows: usize,
    pub dropped_columns: Vec<String>,
    pub imputations: Vec<ImputationRecord>,
    pub cleanups: Vec<CleanupRecord>,
    pub correlated_pairs: Vec<CorrelationPair>,
    pub pruned_columns: Vec<String>,
    pub candidates: Vec<CandidateSummary>,
    pub chosen_backend: String,
    pub chosen_features: Vec<String>,
    pub timings: Vec<StageTiming>,
}

impl RunReport {
    pub fn total_duration(&self) -> Duration {
        self.timings.iter().map(|t| t.duration).sum()
    }
}
