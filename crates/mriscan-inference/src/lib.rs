//! ONNX inference abstraction layer for mriscan.
//!
//! This crate provides a unified interface for running the classifier network
//! across different backends:
//! - `ort` for native platforms, preferring CUDA (feature `cuda`) and falling
//!   back to XNNPACK and the CPU provider
//! - `tract` directly for WASM/browser environments

mod backend;
mod error;
mod tensor;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixture;

pub use backend::{BackendOptions, InferenceBackend};
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

#[cfg(feature = "wasm")]
pub use backend::tract::TractBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
