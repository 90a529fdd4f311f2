//! Configuration module for bag pooling layers
//!
//! A pooling layer reduces a bag of `num_encoding`-wide tile features to
//! `pool_out_dim` pooled vectors. Attention variants project every tile through a
//! hidden layer of width `pool_hidden_dim` before scoring it.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::error::PoolingError;
use super::layer::{AttentionLayer, GatedAttentionLayer, MeanPoolingLayer, Pooling};
use crate::constants::{DEFAULT_POOL_HIDDEN_DIM, DEFAULT_POOL_OUT_DIM};

/// Pooling strategy used to aggregate a bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PoolingType {
    /// tanh attention network followed by a softmax over the bag
    #[default]
    Attention,
    /// Gated (tanh ⊙ sigmoid) attention network followed by a softmax over the bag
    GatedAttention,
    /// Uniform weights over the bag
    Mean,
}

impl PoolingType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolingType::Attention => "attention",
            PoolingType::GatedAttention => "gated_attention",
            PoolingType::Mean => "mean",
        }
    }
}

/// Configuration for a pooling layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingConfig {
    /// Pooling strategy
    #[serde(default)]
    pub pooling_type: PoolingType,

    /// Width of the tile features entering the layer
    pub num_encoding: usize,

    /// Hidden width of the attention network
    #[serde(default = "default_pool_hidden_dim")]
    pub pool_hidden_dim: usize,

    /// Number of attention heads (rows of the attention matrix)
    #[serde(default = "default_pool_out_dim")]
    pub pool_out_dim: usize,
}

fn default_pool_hidden_dim() -> usize {
    DEFAULT_POOL_HIDDEN_DIM
}

fn default_pool_out_dim() -> usize {
    DEFAULT_POOL_OUT_DIM
}

impl PoolingConfig {
    /// Create a new attention pooling configuration
    pub fn new(num_encoding: usize, pool_hidden_dim: usize, pool_out_dim: usize) -> Self {
        Self {
            pooling_type: PoolingType::Attention,
            num_encoding,
            pool_hidden_dim,
            pool_out_dim,
        }
    }

    /// Attention pooling with default hidden and output dimensions
    pub fn attention(num_encoding: usize) -> Self {
        Self::new(num_encoding, DEFAULT_POOL_HIDDEN_DIM, DEFAULT_POOL_OUT_DIM)
    }

    /// Mean pooling; always a single output head
    pub fn mean(num_encoding: usize) -> Self {
        Self {
            pooling_type: PoolingType::Mean,
            num_encoding,
            pool_hidden_dim: DEFAULT_POOL_HIDDEN_DIM,
            pool_out_dim: 1,
        }
    }

    pub fn with_pooling_type(mut self, pooling_type: PoolingType) -> Self {
        self.pooling_type = pooling_type;
        self
    }

    /// Width of the flattened pooled vector handed to the classifier
    pub fn num_features(&self) -> usize {
        self.num_encoding * self.pool_out_dim
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), PoolingError> {
        if self.num_encoding == 0 {
            return Err(PoolingError::ConfigurationError {
                message: "num_encoding must be > 0".to_string(),
            });
        }

        if self.pool_hidden_dim == 0 {
            return Err(PoolingError::ConfigurationError {
                message: "pool_hidden_dim must be > 0".to_string(),
            });
        }

        if self.pool_out_dim == 0 {
            return Err(PoolingError::ConfigurationError {
                message: "pool_out_dim must be > 0".to_string(),
            });
        }

        if self.pooling_type == PoolingType::Mean && self.pool_out_dim != 1 {
            return Err(PoolingError::ConfigurationError {
                message: format!(
                    "mean pooling has a single output head, got pool_out_dim={}",
                    self.pool_out_dim
                ),
            });
        }

        Ok(())
    }

    /// Build the configured pooling layer
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Pooling<B>, PoolingError> {
        self.validate()?;

        let layer = match self.pooling_type {
            PoolingType::Attention => Pooling::Attention(AttentionLayer::new(
                self.num_encoding,
                self.pool_hidden_dim,
                self.pool_out_dim,
                device,
            )),
            PoolingType::GatedAttention => Pooling::GatedAttention(GatedAttentionLayer::new(
                self.num_encoding,
                self.pool_hidden_dim,
                self.pool_out_dim,
                device,
            )),
            PoolingType::Mean => Pooling::Mean(MeanPoolingLayer::new(self.num_encoding)),
        };

        Ok(layer)
    }
}
