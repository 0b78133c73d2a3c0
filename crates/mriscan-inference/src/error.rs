//! Error types for the inference layer.

use thiserror::Error;

/// Errors raised while loading or executing the classifier network.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model artifact could not be parsed or optimized.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The runtime refused to build a session (bad options, missing provider library).
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Tensor data does not fit the declared shape.
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Input tensor was rejected by the runtime.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The forward pass failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Output tensor extraction failed.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// I/O error when reading the model artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
