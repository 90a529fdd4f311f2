//! Pooling layer implementations
//!
//! Every layer maps a bag `[bag_size, num_encoding]` to a pair
//! `(attention, pooled)`:
//! - `attention`: `[pool_out_dim, bag_size]`, one row of tile weights per head
//! - `pooled`: `[pool_out_dim, num_encoding]`, the weighted sum of tile features
//!
//! Rows of the attention matrix are non-negative and sum to 1.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, activation};

use super::error::PoolingError;

/// Shared interface of the bag pooling layers
pub trait PoolingLayer<B: Backend>: std::fmt::Debug {
    /// Width of the tile features the layer accepts
    fn num_encoding(&self) -> usize;

    /// Number of attention heads
    fn pool_out_dim(&self) -> usize;

    /// Pool a bag, returning `(attention, pooled)`
    fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError>;
}

/// Reject empty bags and features of the wrong width, returning the bag size
fn check_bag<B: Backend>(
    features: &Tensor<B, 2>,
    num_encoding: usize,
) -> Result<usize, PoolingError> {
    let [bag_size, width] = features.dims();
    if bag_size == 0 {
        return Err(PoolingError::EmptyBag);
    }
    if width != num_encoding {
        return Err(PoolingError::FeatureDimMismatch {
            expected: num_encoding,
            actual: width,
        });
    }
    Ok(bag_size)
}

/// Attention pooling: `Linear → tanh → Linear`, softmax over the bag
#[derive(Module, Debug)]
pub struct AttentionLayer<B: Backend> {
    /// num_encoding -> pool_hidden_dim
    pub hidden: Linear<B>,
    /// pool_hidden_dim -> pool_out_dim
    pub scores: Linear<B>,
}

impl<B: Backend> AttentionLayer<B> {
    pub fn new(
        num_encoding: usize,
        pool_hidden_dim: usize,
        pool_out_dim: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            hidden: LinearConfig::new(num_encoding, pool_hidden_dim).init(device),
            scores: LinearConfig::new(pool_hidden_dim, pool_out_dim).init(device),
        }
    }
}

impl<B: Backend> PoolingLayer<B> for AttentionLayer<B> {
    fn num_encoding(&self) -> usize {
        self.hidden.weight.val().dims()[0]
    }

    fn pool_out_dim(&self) -> usize {
        self.scores.weight.val().dims()[1]
    }

    fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        check_bag(&features, self.num_encoding())?;

        // [bag_size, pool_out_dim]
        let hidden = activation::tanh(self.hidden.forward(features.clone()));
        let scores = self.scores.forward(hidden);

        let attention = activation::softmax(scores.transpose(), 1);
        let pooled = attention.clone().matmul(features);

        Ok((attention, pooled))
    }
}

/// Gated attention pooling: scores come from `tanh(V x) ⊙ sigmoid(U x)`
#[derive(Module, Debug)]
pub struct GatedAttentionLayer<B: Backend> {
    pub attention_v: Linear<B>,
    pub attention_u: Linear<B>,
    pub scores: Linear<B>,
}

impl<B: Backend> GatedAttentionLayer<B> {
    pub fn new(
        num_encoding: usize,
        pool_hidden_dim: usize,
        pool_out_dim: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            attention_v: LinearConfig::new(num_encoding, pool_hidden_dim).init(device),
            attention_u: LinearConfig::new(num_encoding, pool_hidden_dim).init(device),
            scores: LinearConfig::new(pool_hidden_dim, pool_out_dim).init(device),
        }
    }
}

impl<B: Backend> PoolingLayer<B> for GatedAttentionLayer<B> {
    fn num_encoding(&self) -> usize {
        self.attention_v.weight.val().dims()[0]
    }

    fn pool_out_dim(&self) -> usize {
        self.scores.weight.val().dims()[1]
    }

    fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        check_bag(&features, self.num_encoding())?;

        let gate_v = activation::tanh(self.attention_v.forward(features.clone()));
        let gate_u = activation::sigmoid(self.attention_u.forward(features.clone()));
        let scores = self.scores.forward(gate_v * gate_u);

        let attention = activation::softmax(scores.transpose(), 1);
        let pooled = attention.clone().matmul(features);

        Ok((attention, pooled))
    }
}

/// Mean pooling: every tile weighs `1 / bag_size`
#[derive(Module, Debug, Clone)]
pub struct MeanPoolingLayer {
    num_encoding: usize,
}

impl MeanPoolingLayer {
    pub fn new(num_encoding: usize) -> Self {
        Self { num_encoding }
    }
}

impl<B: Backend> PoolingLayer<B> for MeanPoolingLayer {
    fn num_encoding(&self) -> usize {
        self.num_encoding
    }

    fn pool_out_dim(&self) -> usize {
        1
    }

    fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        let bag_size = check_bag(&features, self.num_encoding)?;

        let attention =
            Tensor::<B, 2>::ones([1, bag_size], &features.device()).div_scalar(bag_size as f32);
        let pooled = attention.clone().matmul(features);

        Ok((attention, pooled))
    }
}

/// The configured pooling layer, as a single trainable module
#[derive(Module, Debug)]
pub enum Pooling<B: Backend> {
    Attention(AttentionLayer<B>),
    GatedAttention(GatedAttentionLayer<B>),
    Mean(MeanPoolingLayer),
}

impl<B: Backend> Pooling<B> {
    fn layer(&self) -> &dyn PoolingLayer<B> {
        match self {
            Pooling::Attention(layer) => layer,
            Pooling::GatedAttention(layer) => layer,
            Pooling::Mean(layer) => layer,
        }
    }

    pub fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        self.layer().forward(features)
    }
}

impl<B: Backend> PoolingLayer<B> for Pooling<B> {
    fn num_encoding(&self) -> usize {
        self.layer().num_encoding()
    }

    fn pool_out_dim(&self) -> usize {
        self.layer().pool_out_dim()
    }

    fn forward(
        &self,
        features: Tensor<B, 2>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), PoolingError> {
        self.layer().forward(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use burn::tensor::Distribution;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type Backend = NdArray<f32>;

    fn values(tensor: Tensor<Backend, 2>) -> Vec<f32> {
        tensor.into_data().convert::<f32>().to_vec().unwrap()
    }

    fn assert_close(actual: Tensor<Backend, 2>, expected: Tensor<Backend, 2>) {
        for (a, e) in values(actual).iter().zip(values(expected).iter()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-5);
        }
    }

    fn random_bag(bag_size: usize, num_encoding: usize) -> Tensor<Backend, 2> {
        Tensor::random(
            [bag_size, num_encoding],
            Distribution::Normal(0.0, 1.0),
            &NdArrayDevice::default(),
        )
    }

    #[test]
    fn test_attention_shapes() {
        let device = NdArrayDevice::default();
        let layer = AttentionLayer::<Backend>::new(16, 5, 3, &device);

        let (attention, pooled) = layer.forward(random_bag(7, 16)).unwrap();
        assert_eq!(attention.dims(), [3, 7]);
        assert_eq!(pooled.dims(), [3, 16]);
        assert_eq!(layer.num_encoding(), 16);
        assert_eq!(layer.pool_out_dim(), 3);
    }

    #[test]
    fn test_single_tile_bag_gets_full_weight() {
        let device = NdArrayDevice::default();
        let layer = AttentionLayer::<Backend>::new(8, 4, 2, &device);

        let bag = random_bag(1, 8);
        let (attention, pooled) = layer.forward(bag.clone()).unwrap();

        assert_eq!(values(attention), vec![1.0, 1.0]);
        // Both heads reproduce the lone tile
        assert_close(pooled, Tensor::cat(vec![bag.clone(), bag], 0));
    }

    #[test]
    fn test_empty_bag_rejected() {
        let device = NdArrayDevice::default();
        let layer = AttentionLayer::<Backend>::new(8, 4, 1, &device);
        let empty = Tensor::<Backend, 2>::zeros([0, 8], &device);

        assert_eq!(layer.forward(empty).unwrap_err(), PoolingError::EmptyBag);
    }

    #[test]
    fn test_feature_width_checked() {
        let device = NdArrayDevice::default();
        let layer = GatedAttentionLayer::<Backend>::new(8, 4, 1, &device);

        assert_eq!(
            layer.forward(random_bag(3, 9)).unwrap_err(),
            PoolingError::FeatureDimMismatch {
                expected: 8,
                actual: 9
            }
        );
    }

    #[test]
    fn test_mean_pooling_matches_feature_mean() {
        let layer = MeanPoolingLayer::new(4);
        let bag = random_bag(5, 4);

        let (attention, pooled) = PoolingLayer::<Backend>::forward(&layer, bag.clone()).unwrap();
        assert_eq!(attention.dims(), [1, 5]);
        assert_close(pooled, bag.mean_dim(0));
    }

    #[test]
    fn test_pooling_variants_report_dimensions() {
        let device = NdArrayDevice::default();
        let gated = Pooling::<Backend>::GatedAttention(GatedAttentionLayer::new(8, 4, 3, &device));
        let mean = Pooling::<Backend>::Mean(MeanPoolingLayer::new(8));

        assert_eq!((gated.num_encoding(), gated.pool_out_dim()), (8, 3));
        assert_eq!((mean.num_encoding(), mean.pool_out_dim()), (8, 1));
        assert_eq!(gated.num_params(), 2 * (8 * 4 + 4) + (4 * 3 + 3));
        assert_eq!(mean.num_params(), 0);
    }
}
