//! Python-facing MIL model over pre-encoded tile features

use burn::tensor::{Int, Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};
use pyo3::prelude::*;

use histo_mil::attention::PoolingType;
use histo_mil::deepmil::{DeepMilConfig, DeepMilModule};
use histo_mil::encoder::{IdentityEncoder, Tiles};

use crate::conversions::{ConversionResult, matrix_from_rows, rows_from_matrix, validate_positive};

type Backend = NdArray<f32>;

fn parse_pooling_type(name: &str) -> PyResult<PoolingType> {
    match name {
        "attention" => Ok(PoolingType::Attention),
        "gated_attention" => Ok(PoolingType::GatedAttention),
        "mean" => Ok(PoolingType::Mean),
        other => Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "Invalid pooling type: {}",
            other
        ))),
    }
}

/// Attention MIL classifier on the CPU backend
///
/// Bags are lists of tile feature vectors; the model keeps its randomly
/// initialised weights, so it serves inference checks and loss evaluation.
#[pyclass(unsendable, name = "DeepMil")]
pub struct PyDeepMil {
    model: DeepMilModule<Backend>,
    device: NdArrayDevice,
}

impl PyDeepMil {
    fn build(num_features: usize, config: DeepMilConfig) -> PyResult<Self> {
        let num_features = validate_positive(num_features, "num_features")?;
        let device = NdArrayDevice::default();
        let model = DeepMilModule::with_tracing(
            Box::new(IdentityEncoder::with_features(num_features)),
            config,
            &device,
        )
        .with_context("Failed to build DeepMIL model")?;

        Ok(Self { model, device })
    }

    fn bag(&self, bag: &[Vec<f32>]) -> PyResult<Tiles<Backend>> {
        let features = matrix_from_rows::<Backend>(bag, &self.device).with_context("Invalid bag")?;
        Ok(Tiles::Features(features))
    }
}

#[pymethods]
impl PyDeepMil {
    #[new]
    #[pyo3(signature = (
        num_features,
        n_classes,
        pool_hidden_dim = 128,
        pool_out_dim = 1,
        pooling_type = "attention",
        dropout_rate = None,
        class_weights = None,
        class_names = None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        num_features: usize,
        n_classes: usize,
        pool_hidden_dim: usize,
        pool_out_dim: usize,
        pooling_type: &str,
        dropout_rate: Option<f64>,
        class_weights: Option<Vec<f32>>,
        class_names: Option<Vec<String>>,
    ) -> PyResult<Self> {
        let config = DeepMilConfig::new(n_classes)
            .with_pooling(parse_pooling_type(pooling_type)?, pool_hidden_dim, pool_out_dim)
            .with_dropout_rate(dropout_rate)
            .with_class_weights(class_weights)
            .with_class_names(class_names);
        Self::build(num_features, config)
    }

    /// Build a model from a JSON configuration
    #[staticmethod]
    fn from_json(num_features: usize, config: &str) -> PyResult<Self> {
        let config = DeepMilConfig::from_json_str(config).with_context("Invalid configuration")?;
        Self::build(num_features, config)
    }

    #[getter]
    fn n_classes(&self) -> usize {
        self.model.config().n_classes
    }

    #[getter]
    fn class_names(&self) -> Vec<String> {
        self.model.class_names()
    }

    /// Logits `[n_classes]` and attention `[pool_out_dim][bag_size]` of one bag
    fn forward(&self, bag: Vec<Vec<f32>>) -> PyResult<(Vec<f32>, Vec<Vec<f32>>)> {
        let (logit, attention) = self
            .model
            .predict(self.bag(&bag)?)
            .with_context("Forward pass failed")?;

        let logit = rows_from_matrix(logit)
            .with_context("Unreadable logits")?
            .concat();
        let attention = rows_from_matrix(attention).with_context("Unreadable attention")?;
        Ok((logit, attention))
    }

    /// Probability of every class for one bag
    fn predict_proba(&self, bag: Vec<Vec<f32>>) -> PyResult<Vec<f32>> {
        let (logit, _) = self
            .model
            .predict(self.bag(&bag)?)
            .with_context("Forward pass failed")?;
        let probs = self
            .model
            .class_probabilities(self.model.activation_fn(logit));

        Ok(rows_from_matrix(probs)
            .with_context("Unreadable probabilities")?
            .concat())
    }

    /// Batch loss of logits `[batch_size][n_classes]` against bag labels
    fn loss(&self, logits: Vec<Vec<f32>>, labels: Vec<i64>) -> PyResult<f32> {
        let logits =
            matrix_from_rows::<Backend>(&logits, &self.device).with_context("Invalid logits")?;
        let [batch_size, n_classes] = logits.dims();
        if batch_size != labels.len() || n_classes != self.model.config().n_classes {
            return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Expected logits [{}, {}], got [{}, {}]",
                labels.len(),
                self.model.config().n_classes,
                batch_size,
                n_classes
            )));
        }
        for &label in &labels {
            self.model.check_label(label).with_context("Invalid labels")?;
        }

        let labels = Tensor::<Backend, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            &self.device,
        );
        Ok(self.model.loss_fn(logits, labels).into_scalar())
    }

    fn __repr__(&self) -> String {
        let config = self.model.config();
        format!(
            "DeepMil(n_classes={}, pooling={}, pool_out_dim={})",
            config.n_classes,
            config.pooling_type.as_str(),
            config.pool_out_dim
        )
    }
}
