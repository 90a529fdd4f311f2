//! Configuration module for the MIL classification model
//!
//! The pooling layer's input width is not part of the configuration: it is
//! taken from the tile encoder when the model is built.

use serde::{Deserialize, Serialize};

use super::error::MilError;
use crate::attention::{PoolingConfig, PoolingType};
use crate::constants::{DEFAULT_POOL_HIDDEN_DIM, DEFAULT_POOL_OUT_DIM};

/// MIL model hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepMilConfig {
    /// Number of model outputs; 1 is binary classification
    pub n_classes: usize,

    #[serde(default)]
    pub pooling_type: PoolingType,

    #[serde(default = "default_pool_hidden_dim")]
    pub pool_hidden_dim: usize,

    #[serde(default = "default_pool_out_dim")]
    pub pool_out_dim: usize,

    /// Dropout applied to the pooled features before the classifier
    #[serde(default)]
    pub dropout_rate: Option<f64>,

    /// Loss weight per class (2 entries for binary models)
    #[serde(default)]
    pub class_weights: Option<Vec<f32>>,

    /// Display name per class (2 entries for binary models)
    #[serde(default)]
    pub class_names: Option<Vec<String>>,

    /// Check metric inputs before every accumulation
    ///
    /// Off by default: a confident model saturates its sigmoid to exactly 0 or
    /// 1, which the check would reject as hard predictions.
    #[serde(default)]
    pub validate_metric_inputs: bool,
}

fn default_pool_hidden_dim() -> usize {
    DEFAULT_POOL_HIDDEN_DIM
}

fn default_pool_out_dim() -> usize {
    DEFAULT_POOL_OUT_DIM
}

impl DeepMilConfig {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            pooling_type: PoolingType::default(),
            pool_hidden_dim: DEFAULT_POOL_HIDDEN_DIM,
            pool_out_dim: DEFAULT_POOL_OUT_DIM,
            dropout_rate: None,
            class_weights: None,
            class_names: None,
            validate_metric_inputs: false,
        }
    }

    pub fn with_pooling(
        mut self,
        pooling_type: PoolingType,
        pool_hidden_dim: usize,
        pool_out_dim: usize,
    ) -> Self {
        self.pooling_type = pooling_type;
        self.pool_hidden_dim = pool_hidden_dim;
        self.pool_out_dim = pool_out_dim;
        self
    }

    pub fn with_dropout_rate(mut self, dropout_rate: Option<f64>) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    pub fn with_class_weights(mut self, class_weights: Option<Vec<f32>>) -> Self {
        self.class_weights = class_weights;
        self
    }

    pub fn with_class_names(mut self, class_names: Option<Vec<String>>) -> Self {
        self.class_names = class_names;
        self
    }

    pub fn with_metric_input_validation(mut self, validate: bool) -> Self {
        self.validate_metric_inputs = validate;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, MilError> {
        let config: Self = serde_json::from_str(json).map_err(|e| MilError::ConfigurationError {
            message: format!("invalid JSON configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_binary(&self) -> bool {
        self.n_classes == 1
    }

    /// Number of classes seen by the metrics; binary models have two
    pub fn num_label_classes(&self) -> usize {
        self.n_classes.max(2)
    }

    /// Configured class names, or the class indices as names
    pub fn class_names(&self) -> Vec<String> {
        match &self.class_names {
            Some(names) => names.clone(),
            None => (0..self.num_label_classes()).map(|i| i.to_string()).collect(),
        }
    }

    /// Pooling configuration for features of width `num_encoding`
    pub fn pooling_config(&self, num_encoding: usize) -> PoolingConfig {
        PoolingConfig::new(num_encoding, self.pool_hidden_dim, self.pool_out_dim)
            .with_pooling_type(self.pooling_type)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), MilError> {
        if self.n_classes == 0 {
            return Err(MilError::ConfigurationError {
                message: "n_classes must be >= 1".to_string(),
            });
        }

        if self.pool_hidden_dim == 0 || self.pool_out_dim == 0 {
            return Err(MilError::ConfigurationError {
                message: format!(
                    "pooling dimensions must be > 0, got pool_hidden_dim={} pool_out_dim={}",
                    self.pool_hidden_dim, self.pool_out_dim
                ),
            });
        }

        if let Some(rate) = self.dropout_rate
            && !(0.0..1.0).contains(&rate)
        {
            return Err(MilError::ConfigurationError {
                message: format!("dropout_rate must be in [0, 1), got {rate}"),
            });
        }

        let expected = self.num_label_classes();
        if let Some(weights) = &self.class_weights {
            if weights.len() != expected {
                return Err(MilError::ConfigurationError {
                    message: format!(
                        "expected {expected} class weights, got {}",
                        weights.len()
                    ),
                });
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(MilError::ConfigurationError {
                    message: format!(
                        "class weights must be finite and non-negative, got {weights:?}"
                    ),
                });
            }
        }

        if let Some(names) = &self.class_names
            && names.len() != expected
        {
            return Err(MilError::ConfigurationError {
                message: format!("expected {expected} class names, got {}", names.len()),
            });
        }

        Ok(())
    }
}

impl Default for DeepMilConfig {
    fn default() -> Self {
        Self::new(1)
    }
}
