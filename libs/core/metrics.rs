//! Metric functions exposed to Python

use pyo3::prelude::*;
use pyo3::types::PyDict;

use histo_mil::metrics::{self, MetricCollection, MetricValue};

use crate::conversions::{ArrayArg, ConversionResult, validate_positive};

/// Raise `ValueError` unless `scores` are soft float scores and `labels` integral
#[pyfunction]
pub fn validate_metric_inputs(scores: ArrayArg, labels: ArrayArg) -> PyResult<()> {
    let scores = scores.to_tensor_data().with_context("Invalid scores")?;
    let labels = labels.to_tensor_data().with_context("Invalid labels")?;
    metrics::validate_metric_inputs(&scores, &labels).with_context("Invalid metric inputs")
}

/// Compute the stage metrics of a model with `n_classes` outputs in one pass
///
/// Scalars map to floats and the confusion matrix to a list of rows.
#[pyfunction]
#[pyo3(signature = (scores, labels, n_classes, validate_inputs = true))]
pub fn compute_metrics<'py>(
    py: Python<'py>,
    scores: ArrayArg,
    labels: ArrayArg,
    n_classes: usize,
    validate_inputs: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let n_classes = validate_positive(n_classes, "n_classes")?;
    let scores = scores.to_tensor_data().with_context("Invalid scores")?;
    let labels = labels.to_tensor_data().with_context("Invalid labels")?;

    let mut collection =
        MetricCollection::for_classes(n_classes).with_input_validation(validate_inputs);
    collection
        .update(&scores, &labels)
        .with_context("Invalid metric inputs")?;
    tracing::debug!(n_classes, samples = labels.num_elements(), "Computing metrics");

    let result = PyDict::new(py);
    for (name, value) in collection.compute() {
        match value {
            MetricValue::Scalar(value) => result.set_item(name, value)?,
            MetricValue::Matrix(rows) => result.set_item(name, rows)?,
        }
    }
    Ok(result)
}
