//! Slide-level classification losses

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, activation};

use crate::constants::CLASS_WEIGHT_EPSILON;

/// Positive-class weight of the binary loss: `w[1] / (w[0] + 1e-5)`
pub fn pos_weight_from_class_weights(class_weights: &[f32; 2]) -> f32 {
    let [negative, positive] = *class_weights;
    positive / (negative + CLASS_WEIGHT_EPSILON)
}

/// Mean binary cross entropy on logits
///
/// `-[pos_weight * y * log σ(x) + (1 - y) * log(1 - σ(x))]`, averaged over the batch.
pub fn binary_cross_entropy_with_logits<B: Backend>(
    logits: Tensor<B, 1>,
    targets: Tensor<B, 1>,
    pos_weight: Option<f32>,
) -> Tensor<B, 1> {
    let log_p = activation::log_sigmoid(logits.clone());
    let log_not_p = activation::log_sigmoid(logits.neg());

    let positive = targets.clone() * log_p;
    let positive = match pos_weight {
        Some(weight) => positive.mul_scalar(weight),
        None => positive,
    };
    let negative = targets.neg().add_scalar(1.0) * log_not_p;

    (positive + negative).neg().mean()
}

/// Cross entropy on logits `[N, C]` with optional per-class weights
///
/// Weighted losses are normalised by the total weight of the targets,
/// `Σ w[y_i] * nll_i / Σ w[y_i]`, so a single sample loses its weight.
pub fn cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    class_weights: Option<Tensor<B, 1>>,
) -> Tensor<B, 1> {
    let log_probs = activation::log_softmax(logits, 1);
    let nll = log_probs
        .gather(1, targets.clone().unsqueeze_dim(1))
        .squeeze::<1>(1)
        .neg();

    match class_weights {
        Some(weights) => {
            let sample_weights = weights.select(0, targets);
            (nll * sample_weights.clone()).sum() / sample_weights.sum()
        }
        None => nll.mean(),
    }
}
