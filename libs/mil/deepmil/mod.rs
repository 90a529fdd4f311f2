//! DeepMIL slide classification module
//!
//! Classifies a whole slide from the bag of its tiles. Labels exist only at the
//! slide level, so every tile of a bag carries the same label.
//!
//! ## Architecture Overview
//!
//! 1. **Encode**: the tile encoder maps every tile to a feature vector
//! 2. **Pool**: the pooling layer weighs tiles and reduces the bag to `pool_out_dim` vectors
//! 3. **Classify**: the flattened pooled vectors pass an optional dropout and a linear head
//! 4. **Activate**: sigmoid (binary, `n_classes == 1`) or softmax (multi-class)
//!
//! Pooling, dropout and the head form the trainable [`DeepMilModel`]; the
//! encoder stays frozen. Steps forward every bag of a batch, compute the
//! (optionally class-weighted) loss, update the stage's metrics and log the
//! loss through the injected `TrainingContext`. Validation and test steps
//! run the model in evaluation mode.
//!
//! ## Usage
//!
//! ```rust
//! use burn::tensor::{Distribution, Int, Tensor};
//! use burn_ndarray::{NdArray, NdArrayDevice};
//! use histo_mil::deepmil::{DeepMilConfig, DeepMilModule, TileBatch};
//! use histo_mil::encoder::{IdentityEncoder, Tiles};
//!
//! type Backend = NdArray<f32>;
//!
//! let device = NdArrayDevice::default();
//! let config = DeepMilConfig::new(3).with_class_weights(Some(vec![1.0, 2.0, 0.5]));
//! let encoder = Box::new(IdentityEncoder::with_features(16));
//! let mut model = DeepMilModule::<Backend>::with_tracing(encoder, config, &device).unwrap();
//!
//! let batch = TileBatch {
//!     slide_ids: vec!["slide_a".to_string()],
//!     tile_ids: vec![(0..4).map(|t| t.to_string()).collect()],
//!     image_paths: None,
//!     tiles: vec![Tiles::Features(Tensor::random([4, 16], Distribution::Default, &device))],
//!     labels: vec![Tensor::<Backend, 1, Int>::from_ints([2, 2, 2, 2], &device)],
//! };
//!
//! let results = model.test_step(batch).unwrap();
//! assert_eq!(results.probs.dims(), [1, 3]);
//! assert_eq!(results.bag_attn[0].dims(), [1, 4]);
//! model.on_test_epoch_end();
//! ```

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod loss;
pub mod model;
pub mod module;

pub use batch::{StepResults, TileBatch};
pub use config::DeepMilConfig;
pub use context::{LogOptions, Stage, TracingContext, TrainingContext};
pub use error::MilError;
pub use loss::{binary_cross_entropy_with_logits, cross_entropy, pos_weight_from_class_weights};
pub use model::DeepMilModel;
pub use module::DeepMilModule;
