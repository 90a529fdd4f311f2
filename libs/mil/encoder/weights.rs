//! Pretrained weight loading
//!
//! Checkpoints are safetensors state mappings (parameter name → tensor) fetched
//! from an `http(s)://` URL, a `file://` URL or a local path. Checkpoint keys are
//! remapped by removing the `model.` and `resnet.` prefixes left by the training
//! wrappers; only keys the backbone knows are applied.

use std::collections::BTreeMap;
use std::time::Duration;

use burn::tensor::TensorData;
use burn::tensor::backend::Backend;
use reqwest::blocking::Client;
use safetensors::{Dtype, SafeTensors};

use super::backbone::Backbone;
use super::error::WeightsError;
use crate::constants::CHECKPOINT_KEY_PREFIXES;

/// Parameter name → tensor data
pub type StateDict = BTreeMap<String, TensorData>;

/// Read the raw checkpoint bytes behind `weights_url`
pub fn fetch_weights(weights_url: &str) -> Result<Vec<u8>, WeightsError> {
    let fetch_error = |message: String| WeightsError::Fetch {
        url: weights_url.to_string(),
        message,
    };

    if weights_url.starts_with("http://") || weights_url.starts_with("https://") {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| fetch_error(e.to_string()))?;
        let response = client
            .get(weights_url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| fetch_error(e.to_string()))?;
        let bytes = response.bytes().map_err(|e| fetch_error(e.to_string()))?;
        return Ok(bytes.to_vec());
    }

    let path = weights_url.strip_prefix("file://").unwrap_or(weights_url);
    std::fs::read(path).map_err(|e| fetch_error(e.to_string()))
}

/// Decode a safetensors payload into a state mapping of `f32` tensors
pub fn decode_safetensors(bytes: &[u8]) -> Result<StateDict, WeightsError> {
    let tensors = SafeTensors::deserialize(bytes).map_err(|e| WeightsError::Decode {
        message: format!("{e:?}"),
    })?;

    let mut state = StateDict::new();
    for (name, view) in tensors.tensors() {
        let values: Vec<f32> = match view.dtype() {
            Dtype::F32 => view
                .data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F64 => view
                .data()
                .chunks_exact(8)
                .map(|b| {
                    let bytes = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
                    f64::from_le_bytes(bytes) as f32
                })
                .collect(),
            other => {
                return Err(WeightsError::UnsupportedDtype {
                    name,
                    dtype: format!("{other:?}"),
                });
            }
        };
        state.insert(name, TensorData::new(values, view.shape().to_vec()));
    }

    Ok(state)
}

/// Strip training-wrapper prefixes from a checkpoint key
pub fn remap_key(key: &str) -> String {
    CHECKPOINT_KEY_PREFIXES
        .iter()
        .fold(key.to_string(), |name, prefix| name.replace(prefix, ""))
}

/// Remap checkpoint keys and keep those present in `model_keys`
///
/// Fails when nothing matches, which means the checkpoint belongs to another architecture.
pub fn select_matching_weights(
    state: StateDict,
    model_keys: &[String],
) -> Result<StateDict, WeightsError> {
    let checkpoint_keys = state.len();
    let matching: StateDict = state
        .into_iter()
        .map(|(key, value)| (remap_key(&key), value))
        .filter(|(key, _)| model_keys.contains(key))
        .collect();

    if matching.is_empty() {
        return Err(WeightsError::NoMatchingKeys { checkpoint_keys });
    }

    Ok(matching)
}

/// Apply the matching entries of `state` to `model`
pub fn apply_state_dict<B: Backend, M: Backbone<B>>(
    model: M,
    state: StateDict,
) -> Result<M, WeightsError> {
    let model_keys = model.parameter_names();
    let matching = select_matching_weights(state, &model_keys)?;

    tracing::info!(
        loaded = matching.len(),
        model_parameters = model_keys.len(),
        "Applying pretrained weights"
    );

    matching
        .into_iter()
        .try_fold(model, |model, (name, data)| model.load_parameter(&name, data))
}

/// Fetch a checkpoint from `weights_url` and load it into `model`
pub fn load_weights_to_model<B: Backend, M: Backbone<B>>(
    weights_url: &str,
    model: M,
) -> Result<M, WeightsError> {
    let bytes = fetch_weights(weights_url)?;
    let state = decode_safetensors(&bytes)?;
    tracing::info!(url = weights_url, tensors = state.len(), "Fetched pretrained weights");
    apply_state_dict(model, state)
}
