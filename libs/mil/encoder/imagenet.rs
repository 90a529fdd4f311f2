//! Frozen image backbones as tile encoders

use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

use super::backbone::{Backbone, ConvBackbone, ConvBackboneConfig};
use super::config::EncoderConfig;
use super::error::EncoderError;
use super::weights::load_weights_to_model;
use super::{TileEncoder, Tiles};
use crate::constants::{IMAGENET_MEAN, IMAGENET_STD};

/// Strip the classifier of `backbone` and freeze it
///
/// Returns the feature extractor and its output width. The width is read from the
/// classifier's input when the network has one, otherwise measured by running a
/// random tile of shape `input_dim` through the network.
pub fn setup_feature_extractor<B: Backend, M: Backbone<B>>(
    backbone: M,
    input_dim: [usize; 3],
    device: &B::Device,
) -> (M, usize) {
    let (feature_extractor, num_features) = match backbone.classifier_in_features() {
        Some(num_features) => (backbone.without_classifier(), num_features),
        None => {
            let [channels, height, width] = input_dim;
            let dummy = Tensor::<B, 4>::random(
                [1, channels, height, width],
                Distribution::Default,
                device,
            );
            let num_features = backbone.forward(dummy).dims()[1];
            (backbone, num_features)
        }
    };

    tracing::debug!(num_features, "Feature extractor ready");
    (feature_extractor.no_grad(), num_features)
}

/// Tile encoder backed by a frozen image backbone
#[derive(Debug)]
pub struct ImageNetEncoder<B: Backend, M: Backbone<B>> {
    feature_extractor: M,
    config: EncoderConfig,
    num_encoding: usize,
    /// Channel mean and std, `[1, 3, 1, 1]` each
    normalisation: Option<(Tensor<B, 4>, Tensor<B, 4>)>,
}

impl<B: Backend, M: Backbone<B>> ImageNetEncoder<B, M> {
    pub fn new(
        backbone: M,
        config: EncoderConfig,
        device: &B::Device,
    ) -> Result<Self, EncoderError> {
        config.validate()?;

        let (feature_extractor, num_encoding) =
            setup_feature_extractor(backbone, config.input_dim(), device);

        let normalisation = config.apply_imagenet_preprocessing.then(|| {
            let mean = Tensor::<B, 1>::from_floats(IMAGENET_MEAN, device).reshape([1, 3, 1, 1]);
            let std = Tensor::<B, 1>::from_floats(IMAGENET_STD, device).reshape([1, 3, 1, 1]);
            (mean, std)
        });

        Ok(Self {
            feature_extractor,
            config,
            num_encoding,
            normalisation,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn feature_extractor(&self) -> &M {
        &self.feature_extractor
    }
}

impl<B: Backend, M: Backbone<B>> TileEncoder<B> for ImageNetEncoder<B, M> {
    fn input_dim(&self) -> Vec<usize> {
        self.config.input_dim().to_vec()
    }

    fn num_encoding(&self) -> usize {
        self.num_encoding
    }

    fn encode(&self, tiles: Tiles<B>) -> Result<Tensor<B, 2>, EncoderError> {
        let Tiles::Images(images) = tiles else {
            return Err(EncoderError::UnsupportedInput {
                message: "image encoder expects image tiles [bag_size, channels, height, width]"
                    .to_string(),
            });
        };

        let [_, channels, height, width] = images.dims();
        let expected = self.input_dim();
        if [channels, height, width].as_slice() != expected.as_slice() {
            return Err(EncoderError::InputShapeMismatch {
                expected,
                actual: vec![channels, height, width],
            });
        }

        let images = match &self.normalisation {
            Some((mean, std)) => (images - mean.clone()) / std.clone(),
            None => images,
        };

        Ok(self.feature_extractor.forward(images))
    }
}

/// Encoder built from a `ConvBackbone` initialised with histopathology SSL weights
///
/// The weights were trained on raw tiles, so ImageNet preprocessing is disabled.
pub fn histo_ssl_encoder<B: Backend>(
    weights_url: &str,
    config: EncoderConfig,
    backbone_config: &ConvBackboneConfig,
    device: &B::Device,
) -> Result<ImageNetEncoder<B, ConvBackbone<B>>, EncoderError> {
    let backbone = backbone_config.init::<B>(device)?;
    let backbone = load_weights_to_model(weights_url, backbone)?;
    ImageNetEncoder::new(backbone, config.with_imagenet_preprocessing(false), device)
}
