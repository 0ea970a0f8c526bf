use super::dataset::TrainingData;
use crate::error::{Result, TheftcastError};
use rand::SeedableRng as _;
use rand::seq::SliceRandom as _;
use rand_chacha::ChaCha8Rng;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: TrainingData,
    pub test: TrainingData,
}

/// Row indices for a stratified split: each class contributes
/// `round(n_class * test_fraction)` rows to the test side, always leaving at
/// least one row of every class for training.
pub fn stratified_indices(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);

    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in 0..n_classes {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == class)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .min(members.len().saturating_sub(1));
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Splits `data` into train and test sets, stratified by class.
pub fn train_test_split(data: &TrainingData, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    let labels = data.y.to_vec();
    let (train_idx, test_idx) = stratified_indices(&labels, test_fraction, seed);
    if test_idx.is_empty() || train_idx.is_empty() {
        return Err(TheftcastError::InsufficientData {
            column: "rows".to_owned(),
            non_missing: data.n_samples(),
        });
    }
    info!(
        "Split {} rows into {} train / {} test",
        data.n_samples(),
        train_idx.len(),
        test_idx.len()
    );
    Ok(TrainTestSplit {
        train: data.select_rows(&train_idx),
        test: data.select_rows(&test_idx),
    })
}
