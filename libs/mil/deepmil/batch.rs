//! Batches of bags and per-step results

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::error::MilError;
use crate::constants::results;
use crate::encoder::Tiles;

/// A collated batch of bags, one entry per slide
#[derive(Debug, Clone)]
pub struct TileBatch<B: Backend> {
    pub slide_ids: Vec<String>,
    /// Tile ids of every bag
    pub tile_ids: Vec<Vec<String>>,
    /// Tile image paths of every bag, when the dataset provides them
    pub image_paths: Option<Vec<Vec<String>>>,
    pub tiles: Vec<Tiles<B>>,
    /// Per-tile labels `[bag_size]` of every bag
    pub labels: Vec<Tensor<B, 1, Int>>,
}

impl<B: Backend> TileBatch<B> {
    pub fn len(&self) -> usize {
        self.slide_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slide_ids.is_empty()
    }

    /// Check that every field holds one entry per bag and one item per tile
    pub fn validate(&self) -> Result<(), MilError> {
        if self.is_empty() {
            return Err(MilError::MalformedBatch {
                message: "batch contains no bags".to_string(),
            });
        }

        let batch_size = self.len();
        let field_lengths = [
            ("tile_ids", self.tile_ids.len()),
            ("tiles", self.tiles.len()),
            ("labels", self.labels.len()),
            (
                "image_paths",
                self.image_paths.as_ref().map_or(batch_size, Vec::len),
            ),
        ];
        for (field, length) in field_lengths {
            if length != batch_size {
                return Err(MilError::MalformedBatch {
                    message: format!("{field} has {length} entries for {batch_size} slides"),
                });
            }
        }

        for (index, tiles) in self.tiles.iter().enumerate() {
            let bag_size = tiles.len();
            let labels = self.labels[index].dims()[0];
            let tile_ids = self.tile_ids[index].len();
            if labels != bag_size || tile_ids != bag_size {
                return Err(MilError::MalformedBatch {
                    message: format!(
                        "bag {index} ({}) has {bag_size} tiles, {labels} labels and {tile_ids} tile ids",
                        self.slide_ids[index]
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Outputs of one step over a batch
#[derive(Debug, Clone)]
pub struct StepResults<B: Backend> {
    pub slide_ids: Vec<String>,
    pub tile_ids: Vec<Vec<String>>,
    pub image_paths: Option<Vec<Vec<String>>>,
    /// Batch loss `[1]`
    pub loss: Tensor<B, 1>,
    /// Activated model outputs `[batch_size, n_classes]`
    pub probs: Tensor<B, 2>,
    /// Probability of every class `[batch_size, max(n_classes, 2)]`
    pub class_probs: Tensor<B, 2>,
    pub pred_labels: Tensor<B, 1, Int>,
    pub true_labels: Tensor<B, 1, Int>,
    /// Attention `[pool_out_dim, bag_size]` of every bag
    pub bag_attn: Vec<Tensor<B, 2>>,
}

impl<B: Backend> StepResults<B> {
    /// Names of the fields present in these results
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec![results::SLIDE_ID, results::TILE_ID];
        if self.image_paths.is_some() {
            keys.push(results::IMAGE_PATH);
        }
        keys.extend([
            results::LOSS,
            results::PROB,
            results::CLASS_PROBS,
            results::PRED_LABEL,
            results::TRUE_LABEL,
            results::BAG_ATTN,
        ]);
        keys
    }
}
