//! Attention-based MIL classifier
//!
//! `tiles → encoder → pooling → flatten → dropout? → linear → logit`

use std::rc::Rc;

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor, TensorData, activation};

use super::batch::{StepResults, TileBatch};
use super::config::DeepMilConfig;
use super::context::{LogOptions, Stage, TracingContext, TrainingContext};
use super::error::MilError;
use super::loss::{binary_cross_entropy_with_logits, cross_entropy, pos_weight_from_class_weights};
use super::model::DeepMilModel;
use crate::constants::BINARY_THRESHOLD;
use crate::constants::metrics::CONF_MATRIX;
use crate::encoder::{TileEncoder, Tiles};
use crate::metrics::{MetricCollection, MetricValue};

/// Multiple-instance classifier over bags of tiles
///
/// Owns the frozen tile encoder and the trainable [`DeepMilModel`]. Hand the
/// model to an optimizer with [`DeepMilModule::map_model`].
#[derive(Debug)]
pub struct DeepMilModule<B: Backend> {
    encoder: Box<dyn TileEncoder<B>>,
    model: DeepMilModel<B>,
    config: DeepMilConfig,

    /// Binary loss weight of the positive class
    pos_weight: Option<f32>,
    /// Multi-class loss weights `[n_classes]`
    class_weights: Option<Tensor<B, 1>>,

    context: Rc<dyn TrainingContext>,

    train_metrics: MetricCollection,
    val_metrics: MetricCollection,
    test_metrics: MetricCollection,
}

impl<B: Backend> DeepMilModule<B> {
    /// Build the model on top of `encoder`, reporting to `context`
    pub fn new(
        encoder: Box<dyn TileEncoder<B>>,
        config: DeepMilConfig,
        context: Rc<dyn TrainingContext>,
        device: &B::Device,
    ) -> Result<Self, MilError> {
        config.validate()?;

        let pooling_config = config.pooling_config(encoder.num_encoding());
        let model =
            DeepMilModel::new(&pooling_config, config.n_classes, config.dropout_rate, device)?;

        let (pos_weight, class_weights) = match &config.class_weights {
            Some(weights) if config.is_binary() => {
                let weights = <&[f32; 2]>::try_from(weights.as_slice()).map_err(|_| {
                    MilError::ConfigurationError {
                        message: format!("expected 2 binary class weights, got {}", weights.len()),
                    }
                })?;
                (Some(pos_weight_from_class_weights(weights)), None)
            }
            Some(weights) => (
                None,
                Some(Tensor::<B, 1>::from_data(
                    TensorData::new(weights.clone(), [weights.len()]),
                    device,
                )),
            ),
            None => (None, None),
        };

        let metrics = || {
            MetricCollection::for_classes(config.n_classes)
                .with_input_validation(config.validate_metric_inputs)
        };
        let (train_metrics, val_metrics, test_metrics) = (metrics(), metrics(), metrics());

        tracing::debug!(
            n_classes = config.n_classes,
            num_encoding = encoder.num_encoding(),
            pooling = config.pooling_type.as_str(),
            pool_out_dim = config.pool_out_dim,
            "DeepMIL model created"
        );

        Ok(Self {
            encoder,
            model,
            config,
            pos_weight,
            class_weights,
            context,
            train_metrics,
            val_metrics,
            test_metrics,
        })
    }

    /// Build the model with a context that logs through `tracing`
    pub fn with_tracing(
        encoder: Box<dyn TileEncoder<B>>,
        config: DeepMilConfig,
        device: &B::Device,
    ) -> Result<Self, MilError> {
        Self::new(encoder, config, Rc::new(TracingContext), device)
    }

    pub fn config(&self) -> &DeepMilConfig {
        &self.config
    }

    pub fn encoder(&self) -> &dyn TileEncoder<B> {
        self.encoder.as_ref()
    }

    /// Pooling layer and classification head
    pub fn model(&self) -> &DeepMilModel<B> {
        &self.model
    }

    /// Replace the trainable model with `update(model)`, e.g. an optimizer step
    pub fn map_model<F>(mut self, update: F) -> Self
    where
        F: FnOnce(DeepMilModel<B>) -> DeepMilModel<B>,
    {
        self.model = update(self.model);
        self
    }

    pub fn class_names(&self) -> Vec<String> {
        self.config.class_names()
    }

    fn encode(&self, tiles: Tiles<B>) -> Result<Tensor<B, 2>, MilError> {
        if tiles.is_empty() {
            return Err(MilError::EmptyBag);
        }
        Ok(self.encoder.encode(tiles)?)
    }

    /// Training-mode pass of one bag
    ///
    /// Returns `(logit [1, n_classes], attention [pool_out_dim, bag_size])`.
    pub fn forward(&self, tiles: Tiles<B>) -> Result<(Tensor<B, 2>, Tensor<B, 2>), MilError> {
        Ok(self.model.forward(self.encode(tiles)?)?)
    }

    /// Evaluation-mode pass of one bag; dropout is skipped
    pub fn predict(&self, tiles: Tiles<B>) -> Result<(Tensor<B, 2>, Tensor<B, 2>), MilError> {
        Ok(self.model.predict(self.encode(tiles)?)?)
    }

    /// Reject labels outside `[0, max(n_classes, 2))`
    pub fn check_label(&self, label: i64) -> Result<(), MilError> {
        let num_classes = self.config.num_label_classes();
        if usize::try_from(label).is_ok_and(|label| label < num_classes) {
            Ok(())
        } else {
            Err(MilError::LabelOutOfRange { label, num_classes })
        }
    }

    /// The label shared by all tiles of a bag, as a `[1]` tensor
    ///
    /// Fails when the tiles disagree or the label is not a class index.
    pub fn get_bag_label(
        &self,
        tile_labels: Tensor<B, 1, Int>,
    ) -> Result<Tensor<B, 1, Int>, MilError> {
        let labels = tile_labels
            .clone()
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| MilError::TensorData {
                message: format!("{e:?}"),
            })?;

        let Some(&first) = labels.first() else {
            return Err(MilError::EmptyBag);
        };
        if let Some(&other) = labels.iter().find(|&&label| label != first) {
            return Err(MilError::BagLabelMismatch { first, other });
        }
        self.check_label(first)?;

        Ok(tile_labels.slice([0..1]))
    }

    /// Batch loss for logits `[N, n_classes]` and labels `[N]`
    pub fn loss_fn(&self, logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        if self.config.is_binary() {
            let [batch_size, _] = logits.dims();
            binary_cross_entropy_with_logits(
                logits.reshape([batch_size]),
                labels.float(),
                self.pos_weight,
            )
        } else {
            cross_entropy(logits, labels, self.class_weights.clone())
        }
    }

    /// Sigmoid (binary) or softmax over classes
    pub fn activation_fn(&self, logits: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.config.is_binary() {
            activation::sigmoid(logits)
        } else {
            activation::softmax(logits, 1)
        }
    }

    /// Thresholded (binary) or argmax (multi-class) labels `[N]` from probabilities
    /// `[N, n_classes]`
    pub fn predict_labels(&self, probs: Tensor<B, 2>) -> Tensor<B, 1, Int> {
        let [batch_size, _] = probs.dims();
        if self.config.is_binary() {
            probs
                .greater_equal_elem(BINARY_THRESHOLD)
                .int()
                .reshape([batch_size])
        } else {
            probs.argmax(1).reshape([batch_size])
        }
    }

    /// Probability of every class; binary outputs become `[1 - p, p]`
    pub fn class_probabilities(&self, probs: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.config.is_binary() {
            Tensor::cat(vec![probs.clone().neg().add_scalar(1.0), probs], 1)
        } else {
            probs
        }
    }

    pub fn metrics(&self, stage: Stage) -> &MetricCollection {
        match stage {
            Stage::Train => &self.train_metrics,
            Stage::Val => &self.val_metrics,
            Stage::Test => &self.test_metrics,
        }
    }

    fn metrics_mut(&mut self, stage: Stage) -> &mut MetricCollection {
        match stage {
            Stage::Train => &mut self.train_metrics,
            Stage::Val => &mut self.val_metrics,
            Stage::Test => &mut self.test_metrics,
        }
    }

    fn log_options(&self, on_step: bool) -> LogOptions {
        LogOptions {
            on_step,
            on_epoch: true,
            sync_dist: self.context.world_size() > 1,
        }
    }

    /// Forward every bag, compute the loss and update the stage's metrics
    ///
    /// Only the training stage runs the model in training mode.
    pub fn shared_step(
        &mut self,
        batch: TileBatch<B>,
        stage: Stage,
    ) -> Result<StepResults<B>, MilError> {
        batch.validate()?;
        let TileBatch {
            slide_ids,
            tile_ids,
            image_paths,
            tiles,
            labels,
        } = batch;
        let batch_size = slide_ids.len();

        let mut bag_logits = Vec::with_capacity(batch_size);
        let mut bag_labels = Vec::with_capacity(batch_size);
        let mut bag_attn = Vec::with_capacity(batch_size);
        for (bag, tile_labels) in tiles.into_iter().zip(labels) {
            let (logit, attention) = match stage {
                Stage::Train => self.forward(bag)?,
                Stage::Val | Stage::Test => self.predict(bag)?,
            };
            bag_logits.push(logit);
            bag_labels.push(self.get_bag_label(tile_labels)?);
            bag_attn.push(attention);
        }

        let logits = Tensor::cat(bag_logits, 0);
        let true_labels = Tensor::cat(bag_labels, 0);

        let loss = self.loss_fn(logits.clone(), true_labels.clone());
        let probs = self.activation_fn(logits);
        let pred_labels = self.predict_labels(probs.clone());
        let class_probs = self.class_probabilities(probs.clone());

        let scores = if self.config.is_binary() {
            probs.clone().reshape([batch_size]).into_data()
        } else {
            probs.clone().into_data()
        };
        self.metrics_mut(stage)
            .update(&scores, &true_labels.clone().into_data())?;

        let loss_value = loss.clone().into_scalar().elem::<f64>();
        self.context
            .log(&format!("{stage}/loss"), loss_value, self.log_options(true));
        tracing::debug!(stage = stage.as_str(), batch_size, loss = loss_value, "step");

        Ok(StepResults {
            slide_ids,
            tile_ids,
            image_paths,
            loss,
            probs,
            class_probs,
            pred_labels,
            true_labels,
            bag_attn,
        })
    }

    /// Training step, returning the loss to optimise
    pub fn training_step(&mut self, batch: TileBatch<B>) -> Result<Tensor<B, 1>, MilError> {
        Ok(self.shared_step(batch, Stage::Train)?.loss)
    }

    pub fn validation_step(&mut self, batch: TileBatch<B>) -> Result<Tensor<B, 1>, MilError> {
        Ok(self.shared_step(batch, Stage::Val)?.loss)
    }

    /// Test step, returning everything needed to inspect the predictions
    pub fn test_step(&mut self, batch: TileBatch<B>) -> Result<StepResults<B>, MilError> {
        self.shared_step(batch, Stage::Test)
    }

    /// Log every metric of `stage` as `<stage>/<metric>`
    ///
    /// The confusion matrix is row-normalised and logged as one per-class
    /// accuracy `<stage>/<class_name>`; classes without samples are skipped.
    pub fn log_metrics(&self, stage: Stage) {
        let class_names = self.class_names();
        let options = self.log_options(false);

        for (name, value) in self.metrics(stage).compute() {
            match value {
                MetricValue::Scalar(value) => {
                    self.context.log(&format!("{stage}/{name}"), value, options);
                }
                MetricValue::Matrix(rows) if name == CONF_MATRIX => {
                    for (class, row) in rows.iter().enumerate() {
                        let support: f64 = row.iter().sum();
                        if support == 0.0 {
                            continue;
                        }
                        let class_name = class_names
                            .get(class)
                            .cloned()
                            .unwrap_or_else(|| class.to_string());
                        self.context
                            .log(&format!("{stage}/{class_name}"), row[class] / support, options);
                    }
                }
                MetricValue::Matrix(_) => {}
            }
        }
    }

    /// Log and reset the metrics of `stage`
    pub fn on_epoch_end(&mut self, stage: Stage) {
        self.log_metrics(stage);
        self.metrics_mut(stage).reset();
    }

    pub fn on_train_epoch_end(&mut self) {
        self.on_epoch_end(Stage::Train);
    }

    pub fn on_validation_epoch_end(&mut self) {
        self.on_epoch_end(Stage::Val);
    }

    pub fn on_test_epoch_end(&mut self) {
        self.on_epoch_end(Stage::Test);
    }
}
