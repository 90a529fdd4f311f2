//! Pass-through encoder for pre-encoded tiles

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

use super::error::EncoderError;
use super::{TileEncoder, Tiles};

/// Encoder for tiles that were already encoded upstream
///
/// Feature tiles are returned unchanged; image-shaped tiles are flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityEncoder {
    input_dim: Vec<usize>,
}

impl IdentityEncoder {
    pub fn new(input_dim: Vec<usize>) -> Self {
        Self { input_dim }
    }

    /// Identity encoder over flat feature vectors of width `num_features`
    pub fn with_features(num_features: usize) -> Self {
        Self::new(vec![num_features])
    }
}

impl<B: Backend> TileEncoder<B> for IdentityEncoder {
    fn input_dim(&self) -> Vec<usize> {
        self.input_dim.clone()
    }

    fn num_encoding(&self) -> usize {
        self.input_dim.iter().product()
    }

    fn encode(&self, tiles: Tiles<B>) -> Result<Tensor<B, 2>, EncoderError> {
        let tile_dim = tiles.tile_dim();
        // Flat encoders also accept image tiles holding the same number of values
        let flattened = self.input_dim.len() == 1
            && tile_dim.iter().product::<usize>() == TileEncoder::<B>::num_encoding(self);
        let matches = tile_dim == self.input_dim || flattened;
        if !matches {
            return Err(EncoderError::InputShapeMismatch {
                expected: self.input_dim.clone(),
                actual: tile_dim,
            });
        }

        Ok(match tiles {
            Tiles::Features(features) => features,
            Tiles::Images(images) => images.flatten::<2>(1, 3),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type Backend = NdArray<f32>;

    #[test]
    fn test_features_pass_through() {
        let device = NdArrayDevice::default();
        let encoder = IdentityEncoder::with_features(32);
        let features = Tensor::<Backend, 2>::random([5, 32], Distribution::Default, &device);

        let encoded = encoder.encode(Tiles::Features(features.clone())).unwrap();
        assert_eq!(
            encoded.into_data().to_vec::<f32>().unwrap(),
            features.into_data().to_vec::<f32>().unwrap()
        );
        assert_eq!(TileEncoder::<Backend>::num_encoding(&encoder), 32);
    }

    #[test]
    fn test_images_flattened() {
        let device = NdArrayDevice::default();
        let encoder = IdentityEncoder::new(vec![2, 4, 4]);
        let images = Tensor::<Backend, 4>::random([3, 2, 4, 4], Distribution::Default, &device);

        let encoded = encoder.encode(Tiles::Images(images)).unwrap();
        assert_eq!(encoded.dims(), [3, 32]);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let device = NdArrayDevice::default();
        let encoder = IdentityEncoder::with_features(16);
        let features = Tensor::<Backend, 2>::zeros([2, 8], &device);

        assert_eq!(
            encoder.encode(Tiles::Features(features)).unwrap_err(),
            EncoderError::InputShapeMismatch {
                expected: vec![16],
                actual: vec![8]
            }
        );
    }
}
