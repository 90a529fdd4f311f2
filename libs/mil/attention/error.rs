//! Error handling for pooling layers

use thiserror::Error;

/// Error types for bag pooling operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolingError {
    /// A bag without tiles cannot be pooled
    #[error("Cannot pool an empty bag (bag_size must be >= 1)")]
    EmptyBag,

    /// Feature width does not match the layer's input dimension
    #[error("Feature dimension mismatch: layer expects {expected}, bag has {actual}")]
    FeatureDimMismatch { expected: usize, actual: usize },

    /// Configuration validation errors
    #[error("Pooling configuration error: {message}")]
    ConfigurationError { message: String },
}
