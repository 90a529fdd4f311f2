//! Image backbones used as frozen feature extractors
//!
//! A backbone maps image tiles `[N, C, H, W]` to flat vectors `[N, F]`. Backbones
//! that end in a classification layer report its input width, which the encoder
//! uses as its feature dimension after stripping the layer.

use burn::module::{Module, Param};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData, activation};
use serde::{Deserialize, Serialize};

use super::error::{EncoderError, WeightsError};

/// Image network usable behind an `ImageNetEncoder`
pub trait Backbone<B: Backend>: Module<B> {
    /// Input width of the final classification layer, if the network has one
    fn classifier_in_features(&self) -> Option<usize>;

    /// Drop the final classification layer so `forward` returns features
    fn without_classifier(self) -> Self;

    /// `[N, C, H, W]` -> `[N, F]`
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Names of the parameters accepted by `load_parameter`
    fn parameter_names(&self) -> Vec<String>;

    /// Replace a named parameter with checkpoint data
    ///
    /// Linear weights are expected in checkpoint layout `[out, in]`.
    fn load_parameter(self, name: &str, data: TensorData) -> Result<Self, WeightsError>;
}

/// Configuration for `ConvBackbone`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvBackboneConfig {
    /// Input image channels
    pub n_channels: usize,

    /// Output channels of each 3x3 convolution; every block after the first halves the resolution
    pub widths: Vec<usize>,

    /// Size of the classification head, `None` for a headless network
    pub num_classes: Option<usize>,
}

impl ConvBackboneConfig {
    pub fn new(n_channels: usize, widths: Vec<usize>) -> Self {
        Self {
            n_channels,
            widths,
            num_classes: None,
        }
    }

    pub fn with_num_classes(mut self, num_classes: Option<usize>) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), EncoderError> {
        if self.n_channels == 0 {
            return Err(EncoderError::ConfigurationError {
                message: "n_channels must be > 0".to_string(),
            });
        }

        if self.widths.is_empty() || self.widths.contains(&0) {
            return Err(EncoderError::ConfigurationError {
                message: format!("widths must be non-empty and positive, got {:?}", self.widths),
            });
        }

        if self.num_classes == Some(0) {
            return Err(EncoderError::ConfigurationError {
                message: "num_classes must be > 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvBackbone<B>, EncoderError> {
        self.validate()?;

        let mut features = Vec::with_capacity(self.widths.len());
        let mut channels_in = self.n_channels;
        for (index, &channels_out) in self.widths.iter().enumerate() {
            let stride = if index == 0 { 1 } else { 2 };
            let conv = Conv2dConfig::new([channels_in, channels_out], [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device);
            features.push(conv);
            channels_in = channels_out;
        }

        let fc = self
            .num_classes
            .map(|num_classes| LinearConfig::new(channels_in, num_classes).init(device));

        Ok(ConvBackbone {
            features,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc,
        })
    }
}

impl Default for ConvBackboneConfig {
    fn default() -> Self {
        Self::new(3, vec![32, 64, 128, 256]).with_num_classes(Some(1000))
    }
}

/// Small convolutional image network: `[conv3x3 → ReLU]* → global average pool → fc?`
#[derive(Module, Debug)]
pub struct ConvBackbone<B: Backend> {
    pub features: Vec<Conv2d<B>>,
    pub pool: AdaptiveAvgPool2d,
    pub fc: Option<Linear<B>>,
}

impl<B: Backend> ConvBackbone<B> {
    fn load_conv(
        mut self,
        index: usize,
        field: &str,
        name: &str,
        data: TensorData,
    ) -> Result<Self, WeightsError> {
        let Some(conv) = self.features.get_mut(index) else {
            return Err(WeightsError::UnknownParameter {
                name: name.to_string(),
            });
        };

        match field {
            "weight" => {
                let expected = conv.weight.val().dims().to_vec();
                check_shape(name, &expected, &data.shape)?;
                let device = conv.weight.val().device();
                conv.weight = Param::from_tensor(Tensor::from_data(data, &device));
            }
            "bias" => {
                let Some(bias) = conv.bias.as_ref() else {
                    return Err(WeightsError::UnknownParameter {
                        name: name.to_string(),
                    });
                };
                let expected = bias.val().dims().to_vec();
                check_shape(name, &expected, &data.shape)?;
                let device = bias.val().device();
                conv.bias = Some(Param::from_tensor(Tensor::from_data(data, &device)));
            }
            _ => {
                return Err(WeightsError::UnknownParameter {
                    name: name.to_string(),
                });
            }
        }

        Ok(self)
    }

    fn load_fc(mut self, field: &str, name: &str, data: TensorData) -> Result<Self, WeightsError> {
        let Some(fc) = self.fc.as_mut() else {
            return Err(WeightsError::UnknownParameter {
                name: name.to_string(),
            });
        };

        match field {
            "weight" => {
                // Stored as [out, in], held as [in, out]
                let [d_input, d_output] = fc.weight.val().dims();
                check_shape(name, &[d_output, d_input], &data.shape)?;
                let device = fc.weight.val().device();
                let weight = Tensor::<B, 2>::from_data(data, &device).transpose();
                fc.weight = Param::from_tensor(weight);
            }
            "bias" => {
                let Some(bias) = fc.bias.as_ref() else {
                    return Err(WeightsError::UnknownParameter {
                        name: name.to_string(),
                    });
                };
                let expected = bias.val().dims().to_vec();
                check_shape(name, &expected, &data.shape)?;
                let device = bias.val().device();
                fc.bias = Some(Param::from_tensor(Tensor::from_data(data, &device)));
            }
            _ => {
                return Err(WeightsError::UnknownParameter {
                    name: name.to_string(),
                });
            }
        }

        Ok(self)
    }
}

fn check_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<(), WeightsError> {
    if expected != actual {
        return Err(WeightsError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

impl<B: Backend> Backbone<B> for ConvBackbone<B> {
    fn classifier_in_features(&self) -> Option<usize> {
        self.fc.as_ref().map(|fc| fc.weight.val().dims()[0])
    }

    fn without_classifier(mut self) -> Self {
        self.fc = None;
        self
    }

    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for conv in &self.features {
            x = activation::relu(conv.forward(x));
        }

        let features = self.pool.forward(x).flatten::<2>(1, 3);
        match &self.fc {
            Some(fc) => fc.forward(features),
            None => features,
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (index, conv) in self.features.iter().enumerate() {
            names.push(format!("features.{index}.weight"));
            if conv.bias.is_some() {
                names.push(format!("features.{index}.bias"));
            }
        }
        if let Some(fc) = &self.fc {
            names.push("fc.weight".to_string());
            if fc.bias.is_some() {
                names.push("fc.bias".to_string());
            }
        }
        names
    }

    fn load_parameter(self, name: &str, data: TensorData) -> Result<Self, WeightsError> {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            ["features", index, field] => {
                let index: usize = index.parse().map_err(|_| WeightsError::UnknownParameter {
                    name: name.to_string(),
                })?;
                self.load_conv(index, field, name, data)
            }
            ["fc", field] => self.load_fc(field, name, data),
            _ => Err(WeightsError::UnknownParameter {
                name: name.to_string(),
            }),
        }
    }
}
