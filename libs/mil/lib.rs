// Attention-based multiple-instance learning library
pub mod attention;
pub mod constants;
pub mod deepmil;
pub mod encoder;
pub mod metrics;

pub use attention::{Pooling, PoolingConfig, PoolingError, PoolingLayer, PoolingType};
pub use deepmil::{
    DeepMilConfig, DeepMilModel, DeepMilModule, MilError, Stage, StepResults, TileBatch,
};
pub use encoder::{EncoderError, TileEncoder, Tiles};
pub use metrics::{MetricCollection, MetricInputError, MetricValue, validate_metric_inputs};
