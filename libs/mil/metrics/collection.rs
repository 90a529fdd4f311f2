//! Per-stage metric collections

use std::collections::BTreeMap;

use burn::tensor::TensorData;

use super::classification::{
    Auroc, ConfusionMetric, ConfusionStat, Metric, MetricValue, Predictions,
};
use super::error::MetricInputError;
use super::validation::{validate_metric_inputs, values_f64};

/// Named set of metric accumulators for one stage
#[derive(Debug)]
pub struct MetricCollection {
    n_classes: usize,
    metrics: Vec<Box<dyn Metric>>,
    validate_inputs: bool,
}

impl MetricCollection {
    /// Metrics for a model with `n_classes` outputs; `n_classes == 1` is the binary case
    ///
    /// - binary: accuracy, AUROC, precision, recall, F1, 2x2 confusion matrix
    /// - multi-class: accuracy, macro and weighted accuracy, AUROC, quadratic
    ///   Cohen's kappa, confusion matrix
    pub fn for_classes(n_classes: usize) -> Self {
        let num_classes = n_classes.max(2);
        let confusion = |stat| Box::new(ConfusionMetric::new(stat, num_classes)) as Box<dyn Metric>;

        let metrics = if n_classes > 1 {
            vec![
                confusion(ConfusionStat::Accuracy),
                confusion(ConfusionStat::MacroAccuracy),
                confusion(ConfusionStat::WeightedAccuracy),
                Box::new(Auroc::new(n_classes)) as Box<dyn Metric>,
                confusion(ConfusionStat::CohenKappa),
                confusion(ConfusionStat::ConfusionMatrix),
            ]
        } else {
            vec![
                confusion(ConfusionStat::Accuracy),
                Box::new(Auroc::new(1)) as Box<dyn Metric>,
                confusion(ConfusionStat::Precision),
                confusion(ConfusionStat::Recall),
                confusion(ConfusionStat::F1),
                confusion(ConfusionStat::ConfusionMatrix),
            ]
        };

        Self {
            n_classes,
            metrics,
            validate_inputs: true,
        }
    }

    /// Enable or disable the input checks run before every update
    pub fn with_input_validation(mut self, validate_inputs: bool) -> Self {
        self.validate_inputs = validate_inputs;
        self
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|metric| metric.name()).collect()
    }

    /// Accumulate a batch of probabilities and labels
    ///
    /// `scores` is `[N]` or `[N, 1]` for binary models (P(positive)) and
    /// `[N, n_classes]` otherwise; `labels` is `[N]`.
    pub fn update(
        &mut self,
        scores: &TensorData,
        labels: &TensorData,
    ) -> Result<(), MetricInputError> {
        if self.validate_inputs {
            validate_metric_inputs(scores, labels)?;
        }

        let n_columns = match scores.shape.as_slice() {
            [_] => 1,
            [_, columns] => *columns,
            shape => {
                return Err(MetricInputError::ScoreWidthMismatch {
                    expected: self.n_classes,
                    actual: shape.iter().skip(1).product(),
                });
            }
        };
        if n_columns != self.n_classes {
            return Err(MetricInputError::ScoreWidthMismatch {
                expected: self.n_classes,
                actual: n_columns,
            });
        }

        let mut targets = Vec::with_capacity(labels.num_elements());
        for label in values_f64(labels)? {
            if label < 0.0 {
                return Err(MetricInputError::LabelOutOfRange {
                    label: label as i64,
                    num_classes: self.n_classes.max(2),
                });
            }
            targets.push(label as usize);
        }

        let predictions = Predictions::new(values_f64(scores)?, n_columns, targets)?;
        self.update_predictions(&predictions);
        Ok(())
    }

    /// Accumulate predictions that are already on the host
    pub fn update_predictions(&mut self, predictions: &Predictions) {
        for metric in &mut self.metrics {
            metric.update(predictions);
        }
    }

    /// Current value of every metric, keyed by metric name
    pub fn compute(&self) -> BTreeMap<&'static str, MetricValue> {
        self.metrics
            .iter()
            .map(|metric| (metric.name(), metric.compute()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|metric| metric.name() == name)
            .map(|metric| metric.compute())
    }

    /// Clear every accumulator
    pub fn reset(&mut self) {
        for metric in &mut self.metrics {
            metric.reset();
        }
    }
}
