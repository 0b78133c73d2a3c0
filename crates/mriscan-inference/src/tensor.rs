//! Tensor types for inference input/output.
//!
//! The classifier consumes and produces `f32` data only.

use ndarray::{ArrayD, IxDyn};

use crate::{InferenceError, Result};

/// Input tensor for inference.
#[derive(Debug)]
pub struct InputTensor(ArrayD<f32>);

impl InputTensor {
    /// Wrap an array that already has its final shape.
    pub fn from_array(arr: ArrayD<f32>) -> Self {
        Self(arr)
    }

    /// Create a tensor from raw data and shape.
    ///
    /// Fails when `data.len()` is not the product of `shape`.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        let arr = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub struct OutputTensor(ArrayD<f32>);

impl OutputTensor {
    /// Build an output from the runtime's flat buffer and shape.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Self)
            .map_err(|e| InferenceError::OutputExtraction(e.to_string()))
    }

    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Flatten into a vector in logical (row-major) order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_f32_shape() {
        let tensor = InputTensor::from_f32(vec![0.0; 12], &[1, 3, 2, 2]).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert_eq!(tensor.len(), 12);
    }

    #[test]
    fn test_from_f32_length_mismatch() {
        let err = InputTensor::from_f32(vec![0.0; 11], &[1, 3, 2, 2]).unwrap_err();
        match err {
            InferenceError::ShapeMismatch { expected, actual, .. } => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 11);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_flatten() {
        let out = OutputTensor::from_shape_vec(&[1, 4], vec![2.0, 1.0, 0.1, 0.1]).unwrap();
        assert_eq!(out.shape(), &[1, 4]);
        assert_eq!(out.to_vec(), vec![2.0, 1.0, 0.1, 0.1]);

        assert!(OutputTensor::from_shape_vec(&[1, 4], vec![1.0; 3]).is_err());
    }
}
