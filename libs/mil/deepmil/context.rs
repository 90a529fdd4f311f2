//! Training-loop context injected into the model
//!
//! The model reports losses and epoch metrics through this interface instead of
//! owning a logger; trainers provide their own implementation.

use std::fmt;
use std::str::FromStr;

use super::error::MilError;

/// Phase of the training loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Train,
    Val,
    Test,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Train, Stage::Val, Stage::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Train => "train",
            Stage::Val => "val",
            Stage::Test => "test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = MilError;

    fn from_str(stage: &str) -> Result<Self, Self::Err> {
        match stage {
            "train" => Ok(Stage::Train),
            "val" => Ok(Stage::Val),
            "test" => Ok(Stage::Test),
            other => Err(MilError::InvalidStage {
                stage: other.to_string(),
            }),
        }
    }
}

/// How a logged value is aggregated by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogOptions {
    /// Record the value at this step
    pub on_step: bool,
    /// Accumulate the value over the epoch
    pub on_epoch: bool,
    /// Reduce the value across devices
    pub sync_dist: bool,
}

/// Logging and distribution facilities of the surrounding trainer
pub trait TrainingContext: fmt::Debug {
    fn log(&self, key: &str, value: f64, options: LogOptions);

    /// Number of processes taking part in training
    fn world_size(&self) -> usize {
        1
    }
}

/// Context that forwards logged values to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingContext;

impl TrainingContext for TracingContext {
    fn log(&self, key: &str, value: f64, options: LogOptions) {
        tracing::info!(
            key,
            value,
            on_step = options.on_step,
            on_epoch = options.on_epoch,
            "metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_invalid_stage() {
        assert_eq!(
            "validation".parse::<Stage>().unwrap_err(),
            MilError::InvalidStage {
                stage: "validation".to_string()
            }
        );
    }
}
