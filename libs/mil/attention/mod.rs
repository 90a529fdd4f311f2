//! Bag pooling module
//!
//! Aggregates a variable-size bag of tile features into a fixed-size slide
//! representation. The attention variants learn one weight per tile and head:
//!
//! 1. **Hidden projection**: `h_i = tanh(W_1 x_i)` (gated: `tanh(V x_i) ⊙ sigmoid(U x_i)`)
//! 2. **Scores**: `s_i = W_2 h_i`, one score per head
//! 3. **Normalisation**: `a_{k,i} = softmax_i(s_{k,i})`
//! 4. **Pooling**: `m_k = Σ_i a_{k,i} x_i`
//!
//! ## Usage
//!
//! ```rust
//! use burn::tensor::{Distribution, Tensor};
//! use burn_ndarray::{NdArray, NdArrayDevice};
//! use histo_mil::attention::PoolingConfig;
//!
//! let device = NdArrayDevice::default();
//! let layer = PoolingConfig::new(64, 16, 2).init::<NdArray<f32>>(&device).unwrap();
//!
//! let bag = Tensor::random([10, 64], Distribution::Default, &device);
//! let (attention, pooled) = layer.forward(bag).unwrap();
//! assert_eq!(attention.dims(), [2, 10]);
//! assert_eq!(pooled.dims(), [2, 64]);
//! ```

pub mod config;
pub mod error;
pub mod layer;

pub use config::{PoolingConfig, PoolingType};
pub use error::PoolingError;
pub use layer::{AttentionLayer, GatedAttentionLayer, MeanPoolingLayer, Pooling, PoolingLayer};
