//! Gradient flow through the MIL model
//!
//! The pooling layer and classifier learn; the tile encoder stays frozen.

use burn::backend::Autodiff;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::{Distribution, Int, Tensor};
use burn_ndarray::{NdArray, NdArrayDevice};

use histo_mil::attention::{AttentionLayer, GatedAttentionLayer, PoolingLayer};
use histo_mil::deepmil::{DeepMilConfig, DeepMilModel, DeepMilModule, TileBatch};
use histo_mil::encoder::{
    ConvBackboneConfig, EncoderConfig, IdentityEncoder, ImageNetEncoder, Tiles,
};

type Backend = Autodiff<NdArray<f32>>;

#[test]
fn test_attention_parameters_receive_gradients() {
    let device = NdArrayDevice::default();
    let layer = AttentionLayer::<Backend>::new(8, 4, 2, &device);
    let bag = Tensor::<Backend, 2>::random([5, 8], Distribution::Normal(0.0, 1.0), &device);

    let (_, pooled) = layer.forward(bag).unwrap();
    let grads = pooled.powf_scalar(2.0).sum().backward();

    assert!(layer.hidden.weight.val().grad(&grads).is_some());
    assert!(layer.scores.weight.val().grad(&grads).is_some());
}

#[test]
fn test_gated_attention_parameters_receive_gradients() {
    let device = NdArrayDevice::default();
    let layer = GatedAttentionLayer::<Backend>::new(8, 4, 1, &device);
    let bag = Tensor::<Backend, 2>::random([3, 8], Distribution::Normal(0.0, 1.0), &device);

    let (_, pooled) = layer.forward(bag).unwrap();
    let grads = pooled.powf_scalar(2.0).sum().backward();

    assert!(layer.attention_v.weight.val().grad(&grads).is_some());
    assert!(layer.attention_u.weight.val().grad(&grads).is_some());
}

#[test]
fn test_frozen_encoder_gets_no_gradients() {
    let device = NdArrayDevice::default();
    let backbone = ConvBackboneConfig::new(3, vec![4, 6])
        .with_num_classes(Some(10))
        .init::<Backend>(&device)
        .unwrap();
    let encoder = ImageNetEncoder::new(backbone, EncoderConfig::new(8, 3), &device).unwrap();
    let frozen_weight = encoder.feature_extractor().features[0].weight.val();

    let mut model = DeepMilModule::with_tracing(
        Box::new(encoder),
        DeepMilConfig::new(1).with_dropout_rate(Some(0.25)),
        &device,
    )
    .unwrap();

    let batch = TileBatch {
        slide_ids: vec!["slide_0".to_string(), "slide_1".to_string()],
        tile_ids: vec![vec!["a".to_string(); 3], vec!["b".to_string(); 2]],
        image_paths: Some(vec![vec!["a.png".to_string(); 3], vec!["b.png".to_string(); 2]]),
        tiles: vec![
            Tiles::Images(Tensor::random([3, 3, 8, 8], Distribution::Default, &device)),
            Tiles::Images(Tensor::random([2, 3, 8, 8], Distribution::Default, &device)),
        ],
        labels: vec![
            Tensor::<Backend, 1, Int>::ones([3], &device),
            Tensor::<Backend, 1, Int>::zeros([2], &device),
        ],
    };

    let loss = model.training_step(batch).unwrap();
    let grads = loss.backward();

    assert!(model.model().classifier.weight.val().grad(&grads).is_some());
    assert!(frozen_weight.grad(&grads).is_none());
}

fn feature_batch(labels: &[i64], bag_size: usize, device: &NdArrayDevice) -> TileBatch<Backend> {
    TileBatch {
        slide_ids: (0..labels.len()).map(|i| format!("slide_{i}")).collect(),
        tile_ids: labels
            .iter()
            .map(|_| (0..bag_size).map(|t| format!("tile_{t}")).collect())
            .collect(),
        image_paths: None,
        tiles: labels
            .iter()
            .map(|_| {
                Tiles::Features(Tensor::random(
                    [bag_size, 6],
                    Distribution::Normal(0.0, 1.0),
                    device,
                ))
            })
            .collect(),
        labels: labels
            .iter()
            .map(|&label| Tensor::full([bag_size], label, device))
            .collect(),
    }
}

fn flat(tensor: Tensor<Backend, 2>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec().unwrap()
}

#[test]
fn test_optimizer_step_updates_classifier() {
    let device = NdArrayDevice::default();
    let mut module = DeepMilModule::with_tracing(
        Box::new(IdentityEncoder::with_features(6)),
        DeepMilConfig::new(3).with_dropout_rate(Some(0.1)),
        &device,
    )
    .unwrap();
    let before = flat(module.model().classifier.weight.val());

    let loss = module.training_step(feature_batch(&[0, 1, 2], 4, &device)).unwrap();
    let grads = GradientsParams::from_grads(loss.backward(), module.model());
    let mut optim = SgdConfig::new().init::<Backend, DeepMilModel<Backend>>();
    module = module.map_model(|model| optim.step(0.5, model, grads));

    let after = flat(module.model().classifier.weight.val());
    assert_eq!(before.len(), after.len());
    assert!(before.iter().zip(&after).any(|(b, a)| b != a));

    // The updated model still runs a step
    assert!(module.validation_step(feature_batch(&[2], 3, &device)).is_ok());
}

#[test]
fn test_evaluation_stages_ignore_dropout() {
    let device = NdArrayDevice::default();
    let mut module = DeepMilModule::with_tracing(
        Box::new(IdentityEncoder::with_features(6)),
        DeepMilConfig::new(2).with_dropout_rate(Some(0.5)),
        &device,
    )
    .unwrap();
    let batch = feature_batch(&[0, 1, 1], 5, &device);

    let reference = flat(module.test_step(batch.clone()).unwrap().probs);
    for _ in 0..4 {
        assert_eq!(flat(module.test_step(batch.clone()).unwrap().probs), reference);
    }

    let val_loss: f32 = module.validation_step(batch.clone()).unwrap().into_scalar();
    for _ in 0..4 {
        let again: f32 = module.validation_step(batch.clone()).unwrap().into_scalar();
        assert_eq!(again, val_loss);
    }

    let (logit, _) = module.predict(batch.tiles[0].clone()).unwrap();
    let (again, _) = module.predict(batch.tiles[0].clone()).unwrap();
    assert_eq!(flat(logit), flat(again));
}
