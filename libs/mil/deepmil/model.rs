//! Trainable part of the MIL classifier
//!
//! `pooled features → flatten → dropout? → linear → logit`. The frozen tile
//! encoder stays outside, so this module is what an optimizer updates.

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use crate::attention::{Pooling, PoolingConfig, PoolingError};

/// Attention pooling followed by the linear classification head
#[derive(Module, Debug)]
pub struct DeepMilModel<B: Backend> {
    pub pooling: Pooling<B>,
    pub dropout: Option<Dropout>,
    /// num_encoding * pool_out_dim -> n_classes
    pub classifier: Linear<B>,
}

impl<B: Backend> DeepMilModel<B> {
    pub fn new(
        pooling_config: &PoolingConfig,
        n_classes: usize,
        dropout_rate: Option<f64>,
        device: &B::Device,
    ) -> Result<Self, PoolingError> {
        Ok(Self {
            pooling: pooling_config.init(device)?,
            dropout: dropout_rate.map(|rate| DropoutConfig::new(rate).init()),
            classifier: LinearConfig::new(pooling_config.num_features(), n_classes).init(device),
        })
    }

    /// Training-mode pass of one bag of features `[bag_size, num_encoding]`
    ///
    /// Returns `(logit [1, n_classes], attention [pool_out_dim, bag_size])`.
    /// Dropout is applied on autodiff backends.
    pub fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        self.run(features, true)
    }

    /// Evaluation-mode pass: dropout is skipped, so outputs are deterministic
    pub fn predict(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        self.run(features, false)
    }

    fn run(
        &self,
        features: Tensor<B, 2>,
        training: bool,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        let (attention, pooled) = self.pooling.forward(features)?;

        let [pool_out_dim, num_encoding] = pooled.dims();
        let pooled = pooled.reshape([1, pool_out_dim * num_encoding]);
        let pooled = match &self.dropout {
            Some(dropout) if training => dropout.forward(pooled),
            _ => pooled,
        };

        Ok((self.classifier.forward(pooled), attention))
    }
}
