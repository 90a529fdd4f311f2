//! Error types for metric inputs

use thiserror::Error;

/// Violations detected before metric accumulation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricInputError {
    /// Labels must be one-dimensional with one entry per score row
    #[error("Expected labels to have shape {expected:?}, got {actual:?}")]
    LabelShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Scores must be probabilities, stored as floats
    #[error("Expected scores to have a floating dtype, got {dtype}")]
    NonFloatScores { dtype: String },

    /// Every score is a whole number, they look like hard labels
    #[error("Scores are all integral values, expected probabilities")]
    IntegralScores,

    /// Labels must be class indices
    #[error("Labels contain non-integral values: {value}")]
    NonIntegralLabels { value: f64 },

    /// Score rows must have one column per model output
    #[error("Expected {expected} score column(s), got {actual}")]
    ScoreWidthMismatch { expected: usize, actual: usize },

    /// Label does not name a class
    #[error("Label {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: i64, num_classes: usize },

    /// Tensor data could not be read back as numbers
    #[error("Unreadable metric input: {message}")]
    Unreadable { message: String },
}
