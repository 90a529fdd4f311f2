//! Python bindings for attention-based multiple-instance learning
//!
//! Exposes the MIL classifier over pre-encoded tile features together with
//! the metric validation and metric collection functions, via PyO3.

use pyo3::prelude::*;

// Module declarations
pub mod conversions;
pub mod metrics;
pub mod model;

/// A Python module implemented in Rust.
#[pymodule]
#[pyo3(name = "histo_rust")]
pub fn histo_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<model::PyDeepMil>()?;
    m.add_function(wrap_pyfunction!(metrics::validate_metric_inputs, m)?)?;
    m.add_function(wrap_pyfunction!(metrics::compute_metrics, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
