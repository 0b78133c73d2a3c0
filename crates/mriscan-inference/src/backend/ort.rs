//! ONNX Runtime (ort) backend for native platforms.

use std::path::Path;
use std::sync::Mutex;

#[cfg(feature = "cuda")]
use ort::ep::CUDA;
use ort::ep::XNNPACK;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use tracing::{debug, info, warn};

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{BackendOptions, InferenceBackend, Result};

/// Backend using ONNX Runtime for native inference.
///
/// Providers are registered in the order given by [`describe_providers`].
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    provider: String,
}

impl OrtBackend {
    /// Load a model from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P, options: BackendOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading ONNX model from: {}", path.display());

        let bytes = std::fs::read(path)?;

        Self::from_bytes(&bytes, options)
    }

    /// Load a model from bytes.
    pub fn from_bytes(bytes: &[u8], options: BackendOptions) -> Result<Self> {
        debug!("Loading ONNX model from {} bytes", bytes.len());

        let mut providers = Vec::new();

        #[cfg(feature = "cuda")]
        if options.prefer_gpu {
            providers.push(CUDA::default().build());
        }
        if options.prefer_gpu && !cfg!(feature = "cuda") {
            warn!("GPU execution requested but no GPU provider is compiled in; using CPU");
        }

        providers.push(XNNPACK::default().build());

        let level = if options.optimize {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        };

        let session = Session::builder()
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?
            .with_execution_providers(providers)
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?
            .with_optimization_level(level)
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?
            .with_intra_threads(options.intra_threads)
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?
            .commit_from_memory(bytes)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        debug!("Model inputs: {:?}", input_names);
        debug!("Model outputs: {:?}", output_names);

        let provider = describe_providers(options.prefer_gpu);
        info!("ONNX Runtime session ready, providers: {}", provider);

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
            provider,
        })
    }

    fn convert_input(tensor: &InputTensor) -> Result<ort::session::SessionInputValue<'static>> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&s| s as i64).collect();
        Tensor::from_array((shape, tensor.to_vec()))
            .map(Into::into)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }
}

/// Providers tried for `prefer_gpu`, in registration order.
///
/// ONNX Runtime skips a provider it cannot initialise on this machine, and
/// its own CPU provider always comes last.
fn describe_providers(prefer_gpu: bool) -> String {
    let mut chain = Vec::new();
    if prefer_gpu && cfg!(feature = "cuda") {
        chain.push("cuda");
    }
    chain.extend(["xnnpack", "cpu"]);

    let chain = chain.join(" > ");
    if prefer_gpu && !cfg!(feature = "cuda") {
        format!("onnxruntime ({chain}; no GPU provider compiled in)")
    } else {
        format!("onnxruntime ({chain})")
    }
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let ort_inputs: Vec<(&str, ort::session::SessionInputValue<'static>)> = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, Self::convert_input(tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self.session.lock().map_err(|e| {
            InferenceError::InferenceFailed(format!("Failed to lock session: {}", e))
        })?;

        let outputs = session
            .run(ort_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());

        for (name, value) in outputs.iter() {
            let (shape_ref, data) = value.try_extract_tensor::<f32>().map_err(|e| {
                InferenceError::OutputExtraction(format!("output '{}': {}", name, e))
            })?;
            let shape: Vec<usize> = shape_ref.iter().map(|&s| s as usize).collect();
            results.push((name.to_string(), OutputTensor::from_shape_vec(&shape, data.to_vec())?));
        }

        Ok(results)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn execution_provider(&self) -> &str {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use pretty_assertions::assert_eq;

    fn cpu_options() -> BackendOptions {
        BackendOptions {
            prefer_gpu: false,
            ..BackendOptions::default()
        }
    }

    #[test]
    fn test_provider_description() {
        assert_eq!(describe_providers(false), "onnxruntime (xnnpack > cpu)");
        if cfg!(feature = "cuda") {
            assert_eq!(describe_providers(true), "onnxruntime (cuda > xnnpack > cpu)");
        } else {
            assert_eq!(
                describe_providers(true),
                "onnxruntime (xnnpack > cpu; no GPU provider compiled in)"
            );
        }
    }

    #[test]
    fn test_runs_fixture_graph() {
        let backend = OrtBackend::from_bytes(&fixture::tiny_classifier(), cpu_options()).unwrap();
        assert_eq!(backend.input_names(), &[fixture::INPUT_NAME.to_string()]);
        assert_eq!(backend.output_names(), &[fixture::OUTPUT_NAME.to_string()]);
        assert_eq!(backend.execution_provider(), "onnxruntime (xnnpack > cpu)");

        let run = || {
            let input = InputTensor::from_f32(
                fixture::channel_planes([0.25, -0.5, 1.0]),
                &fixture::INPUT_SHAPE,
            )
            .unwrap();
            backend.run(&[(fixture::INPUT_NAME, input)]).unwrap()
        };

        let first = run();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, fixture::OUTPUT_NAME);
        assert_eq!(first[0].1.shape(), &[1, 4]);

        let logits = first[0].1.to_vec();
        for (got, want) in logits.iter().zip([0.25, -0.5, 1.0, 0.0]) {
            assert!((got - want).abs() < 1e-5, "{logits:?}");
        }
        assert_eq!(run()[0].1.to_vec(), logits);
    }

    #[test]
    fn test_garbage_model_is_a_load_error() {
        let err = OrtBackend::from_bytes(b"not an onnx graph", cpu_options()).err().unwrap();
        assert!(matches!(err, InferenceError::ModelLoad(_)), "{err}");
    }
}
