// Loss weighting
/// Added to the negative-class weight when deriving the binary `pos_weight`
pub const CLASS_WEIGHT_EPSILON: f32 = 1e-5;

/// Probability threshold separating negative and positive predictions
pub const BINARY_THRESHOLD: f64 = 0.5;

// Pooling hyperparameters
pub const DEFAULT_POOL_HIDDEN_DIM: usize = 128;
pub const DEFAULT_POOL_OUT_DIM: usize = 1;

// Tile geometry
pub const DEFAULT_TILE_SIZE: usize = 224;
pub const DEFAULT_N_CHANNELS: usize = 3;

// ImageNet normalisation statistics (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Key prefixes stripped from checkpoint parameter names before matching
pub const CHECKPOINT_KEY_PREFIXES: [&str; 2] = ["model.", "resnet."];

/// Result dictionary keys
pub mod results {
    pub const SLIDE_ID: &str = "slide_id";
    pub const TILE_ID: &str = "tile_id";
    pub const IMAGE_PATH: &str = "image_path";
    pub const LOSS: &str = "loss";
    pub const PROB: &str = "prob";
    pub const CLASS_PROBS: &str = "prob_class";
    pub const PRED_LABEL: &str = "pred_label";
    pub const TRUE_LABEL: &str = "true_label";
    pub const BAG_ATTN: &str = "bag_attn";
}

/// Metric names, shared by every stage
pub mod metrics {
    pub const ACC: &str = "accuracy";
    pub const ACC_MACRO: &str = "macro_accuracy";
    pub const ACC_WEIGHTED: &str = "weighted_accuracy";
    pub const CONF_MATRIX: &str = "confusion_matrix";
    pub const AUROC: &str = "auroc";
    pub const PRECISION: &str = "precision";
    pub const RECALL: &str = "recall";
    pub const F1: &str = "f1score";
    pub const COHENKAPPA: &str = "cohenkappa";
}
