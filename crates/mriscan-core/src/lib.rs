//! Core library for brain MRI classification.
//!
//! This crate provides:
//! - Upload validation (MIME type and size cap)
//! - Image preprocessing into the network's 1x3x128x128 input tensor
//! - The model session lifecycle (`unloaded -> loading -> ready | failed`)
//! - Softmax and ranking over the four tumor classes
//! - The [`Classifier`] pipeline tying these together

pub mod classifier;
pub mod config;
pub mod error;
pub mod input;
pub mod labels;
pub mod postprocess;
pub mod preprocess;
pub mod session;

#[cfg(test)]
mod testing;

pub use classifier::Classifier;
pub use config::ScanConfig;
pub use error::{ErrorCategory, Result, ScanError};
pub use input::InputPolicy;
pub use labels::{NUM_CLASSES, TumorClass};
pub use postprocess::{ClassScore, Prediction};
pub use preprocess::{ImagePreprocessor, ImageTensor};
pub use session::{LoadOutcome, ModelSession, ModelStatus};

/// Re-export inference types.
pub use mriscan_inference::{
    BackendOptions, InferenceBackend, InferenceError, InputTensor, OutputTensor,
};

#[cfg(feature = "native")]
pub use mriscan_inference::OrtBackend;

#[cfg(feature = "wasm")]
pub use mriscan_inference::TractBackend;

#[cfg(feature = "native")]
/// Load the ONNX Runtime backend described by `config`.
pub fn load_native_backend(
    config: &config::ModelConfig,
) -> std::result::Result<OrtBackend, InferenceError> {
    OrtBackend::from_file(&config.path, config.backend_options())
}

#[cfg(feature = "wasm")]
/// Build a tract backend from model bytes with the input pinned to the network shape.
pub fn load_wasm_backend(bytes: &[u8]) -> std::result::Result<TractBackend, InferenceError> {
    TractBackend::from_bytes_with_shape(bytes, &preprocess::INPUT_SHAPE)
}
