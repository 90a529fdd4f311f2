//! Tile encoder module
//!
//! Tile encoders turn the tiles of a bag into fixed-length feature vectors
//! `[bag_size, num_encoding]` for the pooling layer. Encoders are feature
//! extractors only: their parameters are frozen once constructed.
//!
//! - `IdentityEncoder`: tiles were encoded upstream, features pass through
//! - `ImageNetEncoder`: a frozen image backbone, optionally with ImageNet normalisation
//! - `histo_ssl_encoder`: a `ConvBackbone` initialised from pretrained weights
//!
//! ## Usage
//!
//! ```rust
//! use burn::tensor::{Distribution, Tensor};
//! use burn_ndarray::{NdArray, NdArrayDevice};
//! use histo_mil::encoder::{IdentityEncoder, TileEncoder, Tiles};
//!
//! let device = NdArrayDevice::default();
//! let encoder = IdentityEncoder::new(vec![128]);
//!
//! let features = Tensor::random([4, 128], Distribution::Default, &device);
//! let tiles = Tiles::<NdArray<f32>>::Features(features);
//! let features = encoder.encode(tiles).unwrap();
//! assert_eq!(features.dims(), [4, 128]);
//! ```

pub mod backbone;
pub mod config;
pub mod error;
pub mod identity;
pub mod imagenet;
pub mod weights;

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

pub use backbone::{Backbone, ConvBackbone, ConvBackboneConfig};
pub use config::EncoderConfig;
pub use error::{EncoderError, WeightsError};
pub use identity::IdentityEncoder;
pub use imagenet::{ImageNetEncoder, histo_ssl_encoder, setup_feature_extractor};
pub use weights::{StateDict, load_weights_to_model};

/// The tiles of one bag
#[derive(Debug, Clone)]
pub enum Tiles<B: Backend> {
    /// Raw image tiles `[bag_size, channels, height, width]`
    Images(Tensor<B, 4>),
    /// Pre-encoded tile features `[bag_size, num_features]`
    Features(Tensor<B, 2>),
}

impl<B: Backend> Tiles<B> {
    /// Number of tiles in the bag
    pub fn len(&self) -> usize {
        match self {
            Tiles::Images(images) => images.dims()[0],
            Tiles::Features(features) => features.dims()[0],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of a single tile
    pub fn tile_dim(&self) -> Vec<usize> {
        match self {
            Tiles::Images(images) => images.dims()[1..].to_vec(),
            Tiles::Features(features) => features.dims()[1..].to_vec(),
        }
    }
}

/// Converts the tiles of a bag into `[bag_size, num_encoding]` features
pub trait TileEncoder<B: Backend>: std::fmt::Debug {
    /// Shape of a single tile accepted by the encoder
    fn input_dim(&self) -> Vec<usize>;

    /// Width of the produced feature vectors
    fn num_encoding(&self) -> usize;

    /// Encode all tiles of a bag
    fn encode(&self, tiles: Tiles<B>) -> Result<Tensor<B, 2>, EncoderError>;
}
