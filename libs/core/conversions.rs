//! Type conversion utilities for Python-Rust interoperability
//!
//! Python callers hand over nested lists; these helpers turn them into tensor
//! data and back, and map library errors onto Python exceptions.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use pyo3::prelude::*;

/// Error handling utilities for type conversions
pub trait ConversionResult<T> {
    /// Convert a Result to a PyResult raising `ValueError` with context
    fn with_context(self, context: &str) -> PyResult<T>;
}

impl<T, E> ConversionResult<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context(self, context: &str) -> PyResult<T> {
        self.map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}: {}", context, e))
        })
    }
}

/// Utility function to validate positive numeric values
pub fn validate_positive<T>(value: T, name: &str) -> PyResult<T>
where
    T: PartialOrd + std::fmt::Display + Copy + From<u8>,
{
    if value <= T::from(0) {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(value)
}

/// A Python list (or list of lists) of numbers, keeping whether the values were ints
#[derive(Debug, Clone, PartialEq, FromPyObject)]
pub enum ArrayArg {
    IntMatrix(Vec<Vec<i64>>),
    IntVector(Vec<i64>),
    FloatMatrix(Vec<Vec<f64>>),
    FloatVector(Vec<f64>),
}

impl ArrayArg {
    /// Tensor data with the element type of the Python values
    pub fn to_tensor_data(&self) -> Result<TensorData, String> {
        Ok(match self {
            ArrayArg::IntMatrix(rows) => {
                let (values, shape) = flatten_rows(rows)?;
                TensorData::new(values, shape)
            }
            ArrayArg::IntVector(values) => TensorData::new(values.clone(), [values.len()]),
            ArrayArg::FloatMatrix(rows) => {
                let (values, shape) = flatten_rows(rows)?;
                TensorData::new(values, shape)
            }
            ArrayArg::FloatVector(values) => TensorData::new(values.clone(), [values.len()]),
        })
    }
}

/// Row-major values and `[rows, columns]` of a rectangular nested list
pub fn flatten_rows<T: Clone>(rows: &[Vec<T>]) -> Result<(Vec<T>, [usize; 2]), String> {
    let columns = rows.first().map_or(0, Vec::len);
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != columns) {
        return Err(format!(
            "rows must have equal length: row 0 has {columns} values, row {index} has {}",
            row.len()
        ));
    }
    Ok((rows.concat(), [rows.len(), columns]))
}

/// Float matrix from nested rows
pub fn matrix_from_rows<B: Backend>(
    rows: &[Vec<f32>],
    device: &B::Device,
) -> Result<Tensor<B, 2>, String> {
    let (values, shape) = flatten_rows(rows)?;
    Ok(Tensor::from_data(TensorData::new(values, shape), device))
}

/// Nested rows of a float matrix
pub fn rows_from_matrix<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<Vec<f32>>, String> {
    let [_, columns] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| format!("{e:?}"))?;
    if columns == 0 {
        return Ok(Vec::new());
    }
    Ok(values.chunks(columns).map(<[f32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::DType;
    use burn_ndarray::{NdArray, NdArrayDevice};

    type Backend = NdArray<f32>;

    #[test]
    fn test_flatten_rows() {
        let (values, shape) = flatten_rows(&[vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(shape, [2, 3]);

        assert!(flatten_rows(&[vec![1.0], vec![2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_array_arg_keeps_element_type() {
        let ints = ArrayArg::IntVector(vec![0, 1, 1]).to_tensor_data().unwrap();
        assert_eq!(ints.dtype, DType::I64);
        assert_eq!(ints.shape, vec![3]);

        let floats = ArrayArg::FloatMatrix(vec![vec![0.1, 0.9], vec![0.4, 0.6]])
            .to_tensor_data()
            .unwrap();
        assert_eq!(floats.dtype, DType::F64);
        assert_eq!(floats.shape, vec![2, 2]);
    }

    #[test]
    fn test_matrix_round_trip() {
        let device = NdArrayDevice::default();
        let rows = vec![vec![0.5, -1.0], vec![2.0, 3.5], vec![0.0, 1.0]];

        let tensor = matrix_from_rows::<Backend>(&rows, &device).unwrap();
        assert_eq!(tensor.dims(), [3, 2]);
        assert_eq!(rows_from_matrix(tensor).unwrap(), rows);
    }
}
