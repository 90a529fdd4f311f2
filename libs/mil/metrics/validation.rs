//! Sanity checks for metric inputs
//!
//! Catches the classic mix-ups before they silently corrupt an epoch of
//! metrics: labels and scores swapped, hard predictions passed as scores, or
//! labels with a stray class dimension.

use burn::tensor::TensorData;

use super::error::MetricInputError;

/// Read tensor data as `f64` values regardless of its element type
pub(crate) fn values_f64(data: &TensorData) -> Result<Vec<f64>, MetricInputError> {
    data.clone()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| MetricInputError::Unreadable {
            message: format!("{e:?}"),
        })
}

/// Check that `scores` and `labels` are valid inputs for the classification metrics
///
/// - `labels` has shape `[scores.shape[0]]`
/// - `scores` has a floating dtype and is not entirely made of whole numbers
/// - every label is a whole number
pub fn validate_metric_inputs(
    scores: &TensorData,
    labels: &TensorData,
) -> Result<(), MetricInputError> {
    let expected = vec![scores.shape.first().copied().unwrap_or(0)];
    if labels.shape != expected {
        return Err(MetricInputError::LabelShapeMismatch {
            expected,
            actual: labels.shape.clone(),
        });
    }

    if !scores.dtype.is_float() {
        return Err(MetricInputError::NonFloatScores {
            dtype: format!("{:?}", scores.dtype),
        });
    }

    if values_f64(scores)?.iter().all(|score| score.fract() == 0.0) {
        return Err(MetricInputError::IntegralScores);
    }

    if let Some(&value) = values_f64(labels)?.iter().find(|label| label.fract() != 0.0) {
        return Err(MetricInputError::NonIntegralLabels { value });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scores(values: Vec<f32>, shape: Vec<usize>) -> TensorData {
        TensorData::new(values, shape)
    }

    #[test]
    fn test_valid_inputs() {
        let probs = scores(vec![0.2, 0.8, 0.6, 0.4], vec![2, 2]);
        let labels = TensorData::new(vec![1i64, 0], [2]);
        assert_eq!(validate_metric_inputs(&probs, &labels), Ok(()));
    }

    #[test]
    fn test_float_labels_with_integral_values_accepted() {
        let probs = scores(vec![0.3, 0.9, 0.1], vec![3]);
        let labels = TensorData::new(vec![0.0f32, 1.0, 0.0], [3]);
        assert_eq!(validate_metric_inputs(&probs, &labels), Ok(()));
    }

    #[rstest]
    #[case::column_labels(vec![3, 1])]
    #[case::too_short(vec![2])]
    #[case::scalar(vec![])]
    fn test_label_shape(#[case] label_shape: Vec<usize>) {
        let probs = scores(vec![0.3, 0.9, 0.1], vec![3]);
        let count = label_shape.iter().product::<usize>();
        let labels = TensorData::new(vec![0i64; count], label_shape.clone());

        assert_eq!(
            validate_metric_inputs(&probs, &labels),
            Err(MetricInputError::LabelShapeMismatch {
                expected: vec![3],
                actual: label_shape,
            })
        );
    }

    #[test]
    fn test_int_scores_rejected() {
        let probs = TensorData::new(vec![0i64, 1, 1], [3]);
        let labels = TensorData::new(vec![0i64, 1, 1], [3]);
        assert!(matches!(
            validate_metric_inputs(&probs, &labels),
            Err(MetricInputError::NonFloatScores { .. })
        ));
    }

    #[test]
    fn test_integral_scores_rejected() {
        let probs = scores(vec![0.0, 1.0, 1.0], vec![3]);
        let labels = TensorData::new(vec![0i64, 1, 1], [3]);
        assert_eq!(
            validate_metric_inputs(&probs, &labels),
            Err(MetricInputError::IntegralScores)
        );
    }

    #[test]
    fn test_non_integral_labels_rejected() {
        // Swapped arguments: probabilities passed as labels
        let probs = scores(vec![0.5, 1.0, 0.0], vec![3]);
        let labels = TensorData::new(vec![1.0f32, 0.25, 0.0], [3]);
        assert_eq!(
            validate_metric_inputs(&probs, &labels),
            Err(MetricInputError::NonIntegralLabels { value: 0.25 })
        );
    }
}
