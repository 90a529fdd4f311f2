//! Property tests for bag pooling and output activations

use burn::tensor::{Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};
use proptest::prelude::*;

use histo_mil::attention::{PoolingConfig, PoolingType};
use histo_mil::deepmil::{DeepMilConfig, DeepMilModule};
use histo_mil::encoder::IdentityEncoder;

type Backend = NdArray<f32>;

const NUM_ENCODING: usize = 6;

fn bag_strategy() -> impl Strategy<Value = (usize, Vec<f32>)> {
    (1usize..40).prop_flat_map(|bag_size| {
        (
            Just(bag_size),
            prop::collection::vec(-5.0f32..5.0, bag_size * NUM_ENCODING),
        )
    })
}

fn to_values(tensor: Tensor<Backend, 2>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn attention_rows_sum_to_one(
        (bag_size, features) in bag_strategy(),
        pool_out_dim in 1usize..6,
        gated in any::<bool>(),
    ) {
        let device = NdArrayDevice::default();
        let pooling_type = if gated { PoolingType::GatedAttention } else { PoolingType::Attention };
        let layer = PoolingConfig::new(NUM_ENCODING, 4, pool_out_dim)
            .with_pooling_type(pooling_type)
            .init::<Backend>(&device)
            .unwrap();

        let bag = Tensor::<Backend, 2>::from_data(
            TensorData::new(features, [bag_size, NUM_ENCODING]),
            &device,
        );
        let (attention, pooled) = layer.forward(bag).unwrap();

        prop_assert_eq!(attention.dims(), [pool_out_dim, bag_size]);
        prop_assert_eq!(pooled.dims(), [pool_out_dim, NUM_ENCODING]);
        for weight in to_values(attention.clone()) {
            prop_assert!(weight >= 0.0);
        }
        for sum in to_values(attention.sum_dim(1)) {
            prop_assert!((sum - 1.0).abs() < 1e-4, "row sum {}", sum);
        }
    }

    #[test]
    fn activations_are_probabilities(
        logits in prop::collection::vec(-50.0f32..50.0, 12),
        binary in any::<bool>(),
    ) {
        let device = NdArrayDevice::default();
        let n_classes = if binary { 1 } else { 3 };
        let model = DeepMilModule::<Backend>::with_tracing(
            Box::new(IdentityEncoder::with_features(NUM_ENCODING)),
            DeepMilConfig::new(n_classes),
            &device,
        )
        .unwrap();

        let rows = 12 / n_classes;
        let logits =
            Tensor::<Backend, 2>::from_data(TensorData::new(logits, [rows, n_classes]), &device);
        let probs = model.activation_fn(logits);

        for p in to_values(probs.clone()) {
            prop_assert!((0.0..=1.0).contains(&p));
        }
        if !binary {
            for sum in to_values(probs.sum_dim(1)) {
                prop_assert!((sum - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn mean_pooling_weights_are_uniform((bag_size, features) in bag_strategy()) {
        let device = NdArrayDevice::default();
        let layer = PoolingConfig::mean(NUM_ENCODING).init::<Backend>(&device).unwrap();

        let bag = Tensor::<Backend, 2>::from_data(
            TensorData::new(features, [bag_size, NUM_ENCODING]),
            &device,
        );
        let (attention, _) = layer.forward(bag).unwrap();

        for weight in to_values(attention) {
            prop_assert!((weight - 1.0 / bag_size as f32).abs() < 1e-6);
        }
    }
}
