use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassReport {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Test-split scores of one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub accuracy: f64,
    /// Per-class F1 weighted by class support.
    pub f1_weighted: f64,
    /// ROC AUC of the class-1 probabilities; 0 when the test split holds a
    /// single class.
    pub auc: f64,
    pub report: Vec<ClassReport>,
}

impl Metrics {
    /// Scores predictions against truth. `classes` names classes 0 and 1.
    pub fn evaluate(truth: &[usize], predicted: &[usize], proba: &[f64], classes: &[String]) -> Self {
        let report: Vec<ClassReport> = (0..2)
            .map(|class| {
                let name = classes
                    .get(class)
                    .cloned()
                    .unwrap_or_else(|| class.to_string());
                class_report(truth, predicted, class, name)
            })
            .collect();

        let total: usize = report.iter().map(|r| r.support).sum();
        let f1_weighted = if total == 0 {
            0.0
        } else {
            report
                .iter()
                .map(|r| r.f1 * r.support as f64)
                .sum::<f64>()
                / total as f64
        };

        Self {
            accuracy: accuracy(truth, predicted),
            f1_weighted,
            auc: roc_auc(truth, proba),
            report,
        }
    }

    /// The selection score `(weighted F1 + AUC) / 2`.
    pub fn score(&self) -> f64 {
        (self.f1_weighted + self.auc) / 2.0
    }
}

pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn class_report(truth: &[usize], predicted: &[usize], class: usize, name: String) -> ClassReport {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassReport {
        class: name,
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

/// Rank-based ROC AUC (Mann–Whitney U) with average ranks for ties.
pub fn roc_auc(truth: &[usize], proba: &[f64]) -> f64 {
    let n_pos = truth.iter().filter(|&&t| t == 1).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..proba.len()).collect();
    order.sort_by(|&a, &b| proba[a].total_cmp(&proba[b]));

    let mut ranks = vec![0.0; proba.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && proba[order[j + 1]] == proba[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1 ..= j+1 share their average
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t == 1)
        .map(|(_, r)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec!["RECOVERED".to_owned(), "STOLEN".to_owned()]
    }

    #[test]
    fn test_perfect_predictions() {
        let truth = [0, 0, 1, 1];
        let m = Metrics::evaluate(&truth, &truth, &[0.1, 0.2, 0.8, 0.9], &classes());
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1_weighted, 1.0);
        assert_eq!(m.auc, 1.0);
        assert_eq!(m.score(), 1.0);
        assert_eq!(m.report[1].class, "STOLEN");
        assert_eq!(m.report[1].support, 2);
    }

    #[test]
    fn test_weighted_f1() {
        let truth = [0, 0, 0, 1];
        let predicted = [0, 0, 1, 1];
        let m = Metrics::evaluate(&truth, &predicted, &[0.1, 0.2, 0.6, 0.7], &classes());
        // class 0: p = 1, r = 2/3, f1 = 0.8; class 1: p = 1/2, r = 1, f1 = 2/3
        let expected = (0.8 * 3.0 + (2.0 / 3.0)) / 4.0;
        assert!((m.f1_weighted - expected).abs() < 1e-12);
        assert_eq!(m.accuracy, 0.75);
    }

    #[test]
    fn test_auc_with_ties() {
        let truth = [0, 1, 0, 1];
        let proba = [0.5, 0.5, 0.2, 0.9];
        // Pairs (pos, neg): (0.5,0.5)=0.5, (0.5,0.2)=1, (0.9,0.5)=1, (0.9,0.2)=1
        assert!((roc_auc(&truth, &proba) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_test_split_has_zero_auc() {
        let truth = [1, 1, 1];
        let m = Metrics::evaluate(&truth, &[1, 1, 0], &[0.9, 0.8, 0.3], &classes());
        assert_eq!(m.auc, 0.0);
        assert!(m.accuracy > 0.6);
    }
}
