//! Classification metrics module
//!
//! Each stage (train, validation, test) owns a `MetricCollection` whose
//! accumulators see every batch of the epoch and are reset at epoch end.
//! Inputs are checked by `validate_metric_inputs` before accumulation so that
//! swapped arguments or hard labels passed as scores fail loudly.
//!
//! ## Usage
//!
//! ```rust
//! use burn::tensor::TensorData;
//! use histo_mil::metrics::{MetricCollection, MetricValue};
//!
//! let mut metrics = MetricCollection::for_classes(1);
//! let probs = TensorData::new(vec![0.9f32, 0.2, 0.7], [3]);
//! let labels = TensorData::new(vec![1i64, 0, 0], [3]);
//! metrics.update(&probs, &labels).unwrap();
//!
//! let accuracy = metrics.get("accuracy").unwrap();
//! assert!(matches!(accuracy, MetricValue::Scalar(a) if (a - 2.0 / 3.0).abs() < 1e-9));
//! ```

pub mod classification;
pub mod collection;
pub mod error;
pub mod validation;

pub use classification::{
    Auroc, ConfusionCounts, ConfusionMetric, ConfusionStat, Metric, MetricValue, Predictions,
    binary_auroc,
};
pub use collection::MetricCollection;
pub use error::MetricInputError;
pub use validation::validate_metric_inputs;
