use super::trainer::CandidateModel;
use crate::error::{Result, TheftcastError};
use tracing::info;

/// Anything the selector can rank.
pub trait Scored {
    fn score(&self) -> f64;
}

impl Scored for CandidateModel {
    fn score(&self) -> f64 {
        self.metrics.score()
    }
}

/// Picks the candidate with the highest `(weighted F1 + AUC) / 2`.
pub struct ModelSelector;

impl ModelSelector {
    /// Index of the best candidate. Only a strictly higher score displaces
    /// the current best, so the first of equal scores wins.
    pub fn best_index<T: Scored>(candidates: &[T]) -> Result<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let score = candidate.score();
            let score = if score.is_nan() { f64::NEG_INFINITY } else { score };
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| idx).ok_or(TheftcastError::NoCandidates)
    }

    /// Consumes the candidates and returns the winner.
    pub fn select(candidates: Vec<CandidateModel>) -> Result<CandidateModel> {
        let idx = Self::best_index(&candidates)?;
        let winner = candidates
            .into_iter()
            .nth(idx)
            .ok_or(TheftcastError::NoCandidates)?;
        info!(
            "Selected {} with score {:.4} on {} feature(s)",
            winner.kind,
            winner.score(),
            winner.features.len()
        );
        Ok(winner)
    }
}
