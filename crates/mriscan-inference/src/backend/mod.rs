//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

#[cfg(feature = "wasm")]
pub mod tract;

use crate::{InputTensor, OutputTensor, Result};

/// Trait for ONNX inference backends.
///
/// A backend wraps one loaded network. The same pipeline code runs against
/// ONNX Runtime on native platforms and tract in the browser.
pub trait InferenceBackend: Send + Sync {
    /// Run one forward pass with the given named inputs.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Get the input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Get the output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Human-readable description of the configured execution path.
    fn execution_provider(&self) -> &str;
}

/// Options applied when a session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// Try a GPU execution provider before the CPU ones.
    pub prefer_gpu: bool,
    /// Intra-op thread count.
    pub intra_threads: usize,
    /// Run full graph optimization at load time.
    pub optimize: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            prefer_gpu: true,
            intra_threads: 4,
            optimize: true,
        }
    }
}
