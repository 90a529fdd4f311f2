//! Configuration for image tile encoders

use serde::{Deserialize, Serialize};

use super::error::EncoderError;
use crate::constants::{DEFAULT_N_CHANNELS, DEFAULT_TILE_SIZE};

/// Geometry and preprocessing of the tiles fed to an image encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Tile side length in pixels (tiles are square)
    pub tile_size: usize,

    /// Number of image channels
    pub n_channels: usize,

    /// Normalise tiles with ImageNet channel statistics before encoding
    pub apply_imagenet_preprocessing: bool,
}

impl EncoderConfig {
    pub fn new(tile_size: usize, n_channels: usize) -> Self {
        Self {
            tile_size,
            n_channels,
            apply_imagenet_preprocessing: true,
        }
    }

    pub fn with_imagenet_preprocessing(mut self, apply: bool) -> Self {
        self.apply_imagenet_preprocessing = apply;
        self
    }

    /// Shape of a single tile: `[channels, height, width]`
    pub fn input_dim(&self) -> [usize; 3] {
        [self.n_channels, self.tile_size, self.tile_size]
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), EncoderError> {
        if self.tile_size == 0 {
            return Err(EncoderError::ConfigurationError {
                message: "tile_size must be > 0".to_string(),
            });
        }

        if self.n_channels == 0 {
            return Err(EncoderError::ConfigurationError {
                message: "n_channels must be > 0".to_string(),
            });
        }

        if self.apply_imagenet_preprocessing && self.n_channels != 3 {
            return Err(EncoderError::ConfigurationError {
                message: format!(
                    "ImageNet preprocessing needs 3 channels, got {}",
                    self.n_channels
                ),
            });
        }

        Ok(())
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, DEFAULT_N_CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_dim() {
        assert_eq!(EncoderConfig::new(224, 3).input_dim(), [3, 224, 224]);
    }

    #[test]
    fn test_validate() {
        assert!(EncoderConfig::default().validate().is_ok());
        assert!(EncoderConfig::new(0, 3).validate().is_err());
        assert!(EncoderConfig::new(32, 1).validate().is_err());
        assert!(
            EncoderConfig::new(32, 1)
                .with_imagenet_preprocessing(false)
                .validate()
                .is_ok()
        );
    }
}
