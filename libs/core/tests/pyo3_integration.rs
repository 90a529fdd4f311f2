use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn with_module<F>(f: F)
where
    F: for<'py> FnOnce(Python<'py>, Bound<'py, PyModule>),
{
    Python::initialize();
    Python::attach(|py| {
        let module = pyo3::wrap_pymodule!(histo_core::histo_rust)(py).into_bound(py);
        f(py, module);
    });
}

#[test]
fn test_pyo3_module_can_be_initialized() {
    with_module(|_, module| {
        let version: String = module.getattr("__version__").unwrap().extract().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    });
}

#[test]
fn test_deepmil_forward_shapes() {
    with_module(|_, module| {
        let model = module
            .getattr("DeepMil")
            .unwrap()
            .call1((4, 3, 8, 2))
            .unwrap();
        let bag = vec![vec![0.1f32, 0.2, 0.3, 0.4]; 5];

        let (logits, attention): (Vec<f32>, Vec<Vec<f32>>) =
            model.call_method1("forward", (bag.clone(),)).unwrap().extract().unwrap();
        assert_eq!(logits.len(), 3);
        assert_eq!(attention.len(), 2);
        assert!(attention.iter().all(|row| row.len() == 5));

        let probs: Vec<f32> = model
            .call_method1("predict_proba", (bag,))
            .unwrap()
            .extract()
            .unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    });
}

#[test]
fn test_deepmil_binary_probabilities() {
    with_module(|py, module| {
        let kwargs = PyDict::new(py);
        kwargs.set_item("pooling_type", "gated_attention").unwrap();
        kwargs.set_item("class_names", vec!["benign", "tumour"]).unwrap();
        let model = module
            .getattr("DeepMil")
            .unwrap()
            .call((6, 1), Some(&kwargs))
            .unwrap();

        let n_classes: usize = model.getattr("n_classes").unwrap().extract().unwrap();
        assert_eq!(n_classes, 1);
        let names: Vec<String> = model.getattr("class_names").unwrap().extract().unwrap();
        assert_eq!(names, vec!["benign", "tumour"]);

        let probs: Vec<f32> = model
            .call_method1("predict_proba", (vec![vec![1.0f32; 6]; 3],))
            .unwrap()
            .extract()
            .unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs[0] + probs[1] - 1.0).abs() < 1e-6);
    });
}

#[test]
fn test_deepmil_rejects_bad_arguments() {
    with_module(|py, module| {
        let class = module.getattr("DeepMil").unwrap();

        let err = class.call1((0, 2)).unwrap_err();
        assert!(err.is_instance_of::<PyValueError>(py));

        let kwargs = PyDict::new(py);
        kwargs.set_item("pooling_type", "max").unwrap();
        let err = class.call((4, 2), Some(&kwargs)).unwrap_err();
        assert!(err.is_instance_of::<PyValueError>(py));

        let model = class.call1((4, 2)).unwrap();
        let err = model
            .call_method1("forward", (vec![vec![1.0f32; 3]; 2],))
            .unwrap_err();
        assert!(err.is_instance_of::<PyValueError>(py));
    });
}

#[test]
fn test_deepmil_from_json_and_loss() {
    with_module(|_, module| {
        let model = module
            .getattr("DeepMil")
            .unwrap()
            .call_method1("from_json", (4, r#"{"n_classes": 1, "pool_out_dim": 3}"#))
            .unwrap();

        let loss: f32 = model
            .call_method1("loss", (vec![vec![0.0f32], vec![0.0]], vec![0i64, 1]))
            .unwrap()
            .extract()
            .unwrap();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5);
    });
}

#[test]
fn test_loss_rejects_labels_outside_classes() {
    with_module(|py, module| {
        let model = module.getattr("DeepMil").unwrap().call1((4, 3)).unwrap();
        let logits = vec![vec![0.1f32, 0.2, 0.3], vec![0.0, 0.0, 0.0]];

        for labels in [vec![0i64, 5], vec![-1, 2]] {
            let err = model
                .call_method1("loss", (logits.clone(), labels))
                .unwrap_err();
            assert!(err.is_instance_of::<PyValueError>(py));
        }

        let loss: f32 = model
            .call_method1("loss", (logits, vec![2i64, 0]))
            .unwrap()
            .extract()
            .unwrap();
        assert!(loss.is_finite());
    });
}

#[test]
fn test_validate_metric_inputs() {
    with_module(|py, module| {
        let validate = module.getattr("validate_metric_inputs").unwrap();

        assert!(validate.call1((vec![0.2f64, 0.7, 0.9], vec![0i64, 1, 1])).is_ok());

        // hard predictions passed as scores
        let err = validate.call1((vec![0i64, 1, 1], vec![0i64, 1, 1])).unwrap_err();
        assert!(err.is_instance_of::<PyValueError>(py));

        let err = validate
            .call1((vec![0.2f64, 0.7, 0.9], vec![vec![0i64], vec![1], vec![1]]))
            .unwrap_err();
        assert!(err.is_instance_of::<PyValueError>(py));
    });
}

#[test]
fn test_compute_metrics_binary() {
    with_module(|_, module| {
        let result = module
            .getattr("compute_metrics")
            .unwrap()
            .call1((vec![0.9f64, 0.2, 0.8, 0.4], vec![1i64, 0, 0, 1], 1))
            .unwrap();
        let result = result.downcast::<PyDict>().unwrap();

        let accuracy: f64 = result.get_item("accuracy").unwrap().unwrap().extract().unwrap();
        assert!((accuracy - 0.5).abs() < 1e-12);
        let auroc: f64 = result.get_item("auroc").unwrap().unwrap().extract().unwrap();
        assert!((auroc - 0.75).abs() < 1e-12);
        let matrix: Vec<Vec<f64>> = result
            .get_item("confusion_matrix")
            .unwrap()
            .unwrap()
            .extract()
            .unwrap();
        assert_eq!(matrix, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
    });
}

#[test]
fn test_compute_metrics_multiclass_keys() {
    with_module(|_, module| {
        let probs = vec![
            vec![0.7f64, 0.2, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.2, 0.2, 0.6],
        ];
        let result = module
            .getattr("compute_metrics")
            .unwrap()
            .call1((probs, vec![0i64, 1, 2], 3))
            .unwrap();
        let result = result.downcast::<PyDict>().unwrap();

        let mut keys: Vec<String> = result.keys().extract().unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "accuracy",
                "auroc",
                "cohenkappa",
                "confusion_matrix",
                "macro_accuracy",
                "weighted_accuracy",
            ]
        );
    });
}
