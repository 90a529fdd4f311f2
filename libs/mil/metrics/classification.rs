//! Stateful classification metrics
//!
//! Accumulators work on host-side `Predictions` in `f64`. Confusion based
//! metrics keep a running confusion matrix; AUROC keeps every score until reset.

use std::fmt::Debug;

use super::error::MetricInputError;
use crate::constants::BINARY_THRESHOLD;
use crate::constants::metrics::{
    ACC, ACC_MACRO, ACC_WEIGHTED, AUROC, COHENKAPPA, CONF_MATRIX, F1, PRECISION, RECALL,
};

/// Value produced by a metric
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(f64),
    /// Row-major matrix, rows are true classes
    Matrix(Vec<Vec<f64>>),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(value) => Some(*value),
            MetricValue::Matrix(_) => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&[Vec<f64>]> {
        match self {
            MetricValue::Scalar(_) => None,
            MetricValue::Matrix(rows) => Some(rows),
        }
    }
}

/// One batch of model outputs with their targets
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    /// Row-major `[n_samples, n_columns]`; binary models have a single column, P(positive)
    probs: Vec<f64>,
    n_columns: usize,
    targets: Vec<usize>,
}

impl Predictions {
    pub fn new(
        probs: Vec<f64>,
        n_columns: usize,
        targets: Vec<usize>,
    ) -> Result<Self, MetricInputError> {
        if n_columns == 0 || probs.len() != targets.len() * n_columns {
            return Err(MetricInputError::ScoreWidthMismatch {
                expected: n_columns,
                actual: probs.len().checked_div(targets.len()).unwrap_or(0),
            });
        }

        let num_classes = n_columns.max(2);
        if let Some(&label) = targets.iter().find(|&&label| label >= num_classes) {
            return Err(MetricInputError::LabelOutOfRange {
                label: label as i64,
                num_classes,
            });
        }

        Ok(Self {
            probs,
            n_columns,
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of classes; a single-column (binary) output has two
    pub fn num_classes(&self) -> usize {
        self.n_columns.max(2)
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.probs[index * self.n_columns..(index + 1) * self.n_columns]
    }

    /// Score of `class` for every sample
    pub fn class_scores(&self, class: usize) -> Vec<f64> {
        (0..self.len())
            .map(|i| {
                if self.n_columns == 1 {
                    let p = self.probs[i];
                    if class == 1 { p } else { 1.0 - p }
                } else {
                    self.probs[i * self.n_columns + class]
                }
            })
            .collect()
    }

    /// Thresholded (binary) or argmax (multi-class) predictions
    pub fn predicted(&self) -> Vec<usize> {
        (0..self.len())
            .map(|i| {
                let row = self.row(i);
                if self.n_columns == 1 {
                    usize::from(row[0] >= BINARY_THRESHOLD)
                } else {
                    argmax(row)
                }
            })
            .collect()
    }
}

/// Index of the first maximum
fn argmax(row: &[f64]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Stateful metric accumulated over an epoch
pub trait Metric: Debug + Send {
    fn name(&self) -> &'static str;

    fn update(&mut self, predictions: &Predictions);

    fn compute(&self) -> MetricValue;

    fn reset(&mut self);
}

/// Running confusion counts, rows are true classes and columns predictions
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionCounts {
    num_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionCounts {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
        }
    }

    pub fn update(&mut self, predictions: &Predictions) {
        for (&target, predicted) in predictions.targets().iter().zip(predictions.predicted()) {
            if target < self.num_classes && predicted < self.num_classes {
                self.counts[target * self.num_classes + predicted] += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.counts.fill(0);
    }

    pub fn get(&self, target: usize, predicted: usize) -> f64 {
        self.counts[target * self.num_classes + predicted] as f64
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum::<u64>() as f64
    }

    pub fn true_positives(&self, class: usize) -> f64 {
        self.get(class, class)
    }

    /// Samples of `class` (row sum)
    pub fn support(&self, class: usize) -> f64 {
        (0..self.num_classes).map(|p| self.get(class, p)).sum()
    }

    /// Samples predicted as `class` (column sum)
    pub fn predicted_count(&self, class: usize) -> f64 {
        (0..self.num_classes).map(|t| self.get(t, class)).sum()
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.num_classes)
            .map(|t| (0..self.num_classes).map(|p| self.get(t, p)).collect())
            .collect()
    }

    /// Per-class recall averaged over classes that occur, either in targets or predictions
    fn macro_recall(&self) -> f64 {
        let (sum, count) = (0..self.num_classes)
            .filter(|&c| self.support(c) + self.predicted_count(c) > 0.0)
            .fold((0.0, 0usize), |(sum, count), c| {
                (sum + safe_div(self.true_positives(c), self.support(c)), count + 1)
            });
        safe_div(sum, count as f64)
    }

    /// Per-class recall weighted by class support
    fn weighted_recall(&self) -> f64 {
        let total = self.total();
        let weighted: f64 = (0..self.num_classes)
            .map(|c| safe_div(self.true_positives(c), self.support(c)) * self.support(c))
            .sum();
        safe_div(weighted, total)
    }

    /// Cohen's kappa with quadratic disagreement weights
    fn quadratic_kappa(&self) -> Option<f64> {
        let total = self.total();
        if total == 0.0 {
            return None;
        }

        let mut observed = 0.0;
        let mut expected = 0.0;
        for t in 0..self.num_classes {
            for p in 0..self.num_classes {
                let weight = (t as f64 - p as f64).powi(2);
                observed += weight * self.get(t, p) / total;
                expected += weight * self.support(t) * self.predicted_count(p) / (total * total);
            }
        }

        (expected != 0.0).then(|| 1.0 - observed / expected)
    }
}

/// Statistic read from the confusion counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfusionStat {
    /// Fraction of correct predictions
    Accuracy,
    /// Mean per-class recall
    MacroAccuracy,
    /// Support-weighted per-class recall
    WeightedAccuracy,
    /// Positive-class precision (binary)
    Precision,
    /// Positive-class recall (binary)
    Recall,
    /// Positive-class F1 (binary)
    F1,
    CohenKappa,
    ConfusionMatrix,
}

impl ConfusionStat {
    pub fn name(&self) -> &'static str {
        match self {
            ConfusionStat::Accuracy => ACC,
            ConfusionStat::MacroAccuracy => ACC_MACRO,
            ConfusionStat::WeightedAccuracy => ACC_WEIGHTED,
            ConfusionStat::Precision => PRECISION,
            ConfusionStat::Recall => RECALL,
            ConfusionStat::F1 => F1,
            ConfusionStat::CohenKappa => COHENKAPPA,
            ConfusionStat::ConfusionMatrix => CONF_MATRIX,
        }
    }
}

/// Metric derived from a running confusion matrix
#[derive(Debug, Clone)]
pub struct ConfusionMetric {
    stat: ConfusionStat,
    counts: ConfusionCounts,
}

impl ConfusionMetric {
    pub fn new(stat: ConfusionStat, num_classes: usize) -> Self {
        Self {
            stat,
            counts: ConfusionCounts::new(num_classes),
        }
    }
}

impl Metric for ConfusionMetric {
    fn name(&self) -> &'static str {
        self.stat.name()
    }

    fn update(&mut self, predictions: &Predictions) {
        self.counts.update(predictions);
    }

    fn compute(&self) -> MetricValue {
        let counts = &self.counts;
        // Positive class of the binary statistics
        let positive = 1;
        let tp = counts.true_positives(positive);
        let precision = safe_div(tp, counts.predicted_count(positive));
        let recall = safe_div(tp, counts.support(positive));

        let value = match self.stat {
            ConfusionStat::Accuracy => {
                let correct: f64 = (0..counts.num_classes).map(|c| counts.true_positives(c)).sum();
                safe_div(correct, counts.total())
            }
            ConfusionStat::MacroAccuracy => counts.macro_recall(),
            ConfusionStat::WeightedAccuracy => counts.weighted_recall(),
            ConfusionStat::Precision => precision,
            ConfusionStat::Recall => recall,
            ConfusionStat::F1 => safe_div(2.0 * precision * recall, precision + recall),
            ConfusionStat::CohenKappa => counts.quadratic_kappa().unwrap_or_else(|| {
                tracing::warn!(
                    "Cohen's kappa is undefined without disagreement chance, returning 0"
                );
                0.0
            }),
            ConfusionStat::ConfusionMatrix => return MetricValue::Matrix(counts.rows()),
        };

        MetricValue::Scalar(value)
    }

    fn reset(&mut self) {
        self.counts.reset();
    }
}

/// Area under the ROC curve; macro one-vs-rest for multi-class outputs
#[derive(Debug, Clone, Default)]
pub struct Auroc {
    probs: Vec<f64>,
    targets: Vec<usize>,
    n_columns: usize,
}

impl Auroc {
    pub fn new(n_columns: usize) -> Self {
        Self {
            probs: Vec::new(),
            targets: Vec::new(),
            n_columns,
        }
    }
}

/// Rank-sum AUROC of `scores` against `positives`; `None` when one class is absent
pub fn binary_auroc(scores: &[f64], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average ranks (1-based) over ties
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = rank;
        }
        start = end;
    }

    let positive_rank_sum: f64 = ranks
        .iter()
        .zip(positives)
        .filter(|(_, p)| **p)
        .map(|(rank, _)| rank)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

impl Metric for Auroc {
    fn name(&self) -> &'static str {
        AUROC
    }

    fn update(&mut self, predictions: &Predictions) {
        self.n_columns = predictions.n_columns;
        self.probs.extend_from_slice(&predictions.probs);
        self.targets.extend_from_slice(&predictions.targets);
    }

    fn compute(&self) -> MetricValue {
        if self.targets.is_empty() {
            return MetricValue::Scalar(0.0);
        }

        let predictions = Predictions {
            probs: self.probs.clone(),
            n_columns: self.n_columns,
            targets: self.targets.clone(),
        };

        let classes: Vec<usize> = if self.n_columns == 1 {
            vec![1]
        } else {
            (0..self.n_columns).collect()
        };

        let scores: Vec<f64> = classes
            .iter()
            .map(|&class| {
                let positives: Vec<bool> = self.targets.iter().map(|&t| t == class).collect();
                binary_auroc(&predictions.class_scores(class), &positives).unwrap_or_else(|| {
                    tracing::warn!(
                        class,
                        "AUROC undefined: only one class present in targets, returning 0"
                    );
                    0.0
                })
            })
            .collect();

        MetricValue::Scalar(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    fn reset(&mut self) {
        self.probs.clear();
        self.targets.clear();
    }
}
