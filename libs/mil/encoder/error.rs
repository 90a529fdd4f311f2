//! Error types for tile encoders and pretrained weight loading

use thiserror::Error;

/// Error types for pretrained weight loading
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    /// Weights could not be read from their location
    #[error("Failed to fetch weights from {url}: {message}")]
    Fetch { url: String, message: String },

    /// Payload is not a valid state mapping
    #[error("Failed to decode weights: {message}")]
    Decode { message: String },

    /// Tensor stored with an element type we cannot load
    #[error("Unsupported dtype {dtype} for parameter {name}")]
    UnsupportedDtype { name: String, dtype: String },

    /// None of the checkpoint keys match the model, the checkpoint is incompatible
    #[error("Weights could not be loaded: none of the {checkpoint_keys} checkpoint keys match the model")]
    NoMatchingKeys { checkpoint_keys: usize },

    /// Parameter name unknown to the model
    #[error("Unknown parameter {name}")]
    UnknownParameter { name: String },

    /// Stored tensor shape differs from the model parameter
    #[error("Shape mismatch for {name}: model expects {expected:?}, checkpoint has {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Error types for tile encoder operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncoderError {
    /// Configuration validation errors
    #[error("Encoder configuration error: {message}")]
    ConfigurationError { message: String },

    /// Tiles do not have the shape the encoder was built for
    #[error("Tile shape mismatch: encoder expects {expected:?}, got {actual:?}")]
    InputShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Tiles of a kind the encoder cannot consume
    #[error("Unsupported encoder input: {message}")]
    UnsupportedInput { message: String },

    /// Pretrained weights could not be applied
    #[error(transparent)]
    Weights(#[from] WeightsError),
}
