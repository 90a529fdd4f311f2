//! Error handling for the MIL classification module

use thiserror::Error;

use crate::attention::PoolingError;
use crate::encoder::EncoderError;
use crate::metrics::MetricInputError;

/// Error types for MIL model construction and step execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MilError {
    /// Configuration validation errors
    #[error("DeepMIL configuration error: {message}")]
    ConfigurationError { message: String },

    /// A bag without tiles has no slide-level prediction
    #[error("Empty bag: a bag must contain at least one tile")]
    EmptyBag,

    /// Tiles of one bag carry different labels
    #[error("Tiles of a bag disagree on the label: {first} vs {other}")]
    BagLabelMismatch { first: i64, other: i64 },

    /// A bag label is not a valid class index
    #[error("Label {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: i64, num_classes: usize },

    /// Batch fields are inconsistent or empty
    #[error("Malformed batch: {message}")]
    MalformedBatch { message: String },

    /// Unknown stage name
    #[error("Invalid stage {stage:?}, expected one of train, val, test")]
    InvalidStage { stage: String },

    /// Tensor data could not be read back
    #[error("Tensor data error: {message}")]
    TensorData { message: String },

    #[error(transparent)]
    Pooling(#[from] PoolingError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    MetricInput(#[from] MetricInputError),
}
