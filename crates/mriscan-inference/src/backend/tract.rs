//! Tract backend for browser (WASM) inference.

use tract_onnx::prelude::*;
use tracing::debug;

use crate::error::InferenceError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

type RunnablePlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Backend using Tract for pure-Rust CPU inference.
///
/// Tract has no GPU path; the execution provider says so.
pub struct TractBackend {
    model: RunnablePlan,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl TractBackend {
    /// Load a model from bytes, pinning the first input to `input_shape`.
    pub fn from_bytes_with_shape(bytes: &[u8], input_shape: &[usize]) -> Result<Self> {
        debug!("Loading ONNX model with Tract from {} bytes", bytes.len());

        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to load model: {}", e)))?;

        // Names have to be read before the graph is typed and optimized.
        let input_names = node_names(&model, model.input_outlets());
        let output_names = node_names(&model, model.output_outlets());

        model
            .set_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), input_shape))
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to set input shape: {}", e)))?;

        let model = model
            .into_typed()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to type model: {}", e)))?
            .into_optimized()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to optimize: {}", e)))?
            .into_runnable()
            .map_err(|e| InferenceError::SessionCreate(e.to_string()))?;

        debug!("Model inputs: {:?}", input_names);
        debug!("Model outputs: {:?}", output_names);

        Ok(Self {
            model,
            input_names,
            output_names,
        })
    }

    fn convert_input(tensor: &InputTensor) -> Result<TValue> {
        let shape = tract_ndarray::IxDyn(tensor.shape());
        let arr = tract_ndarray::ArrayD::from_shape_vec(shape, tensor.to_vec())
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;
        Ok(arr.into_tvalue())
    }
}

fn node_names(model: &InferenceModel, outlets: TractResult<&[OutletId]>) -> Vec<String> {
    outlets
        .map(|outlets| {
            outlets
                .iter()
                .map(|o| model.node(o.node).name.clone())
                .collect()
        })
        .unwrap_or_default()
}

impl InferenceBackend for TractBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let tract_inputs: TVec<TValue> = inputs
            .iter()
            .map(|(_, tensor)| Self::convert_input(tensor))
            .collect::<Result<TVec<_>>>()?;

        let outputs = self
            .model
            .run(tract_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());

        for (idx, output) in outputs.iter().enumerate() {
            let name = self
                .output_names
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("output_{}", idx));

            let view = output.to_array_view::<f32>().map_err(|e| {
                InferenceError::OutputExtraction(format!("output '{}': {}", name, e))
            })?;
            let data: Vec<f32> = view.iter().copied().collect();
            let tensor = OutputTensor::from_shape_vec(view.shape(), data)?;

            results.push((name, tensor));
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
        "tract (cpu; no GPU provider)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use pretty_assertions::assert_eq;

    fn load() -> TractBackend {
        TractBackend::from_bytes_with_shape(&fixture::tiny_classifier(), &fixture::INPUT_SHAPE)
            .unwrap()
    }

    #[test]
    fn test_names_captured_before_optimization() {
        let backend = load();
        assert_eq!(backend.input_names(), &[fixture::INPUT_NAME.to_string()]);
        assert_eq!(backend.output_names(), &[fixture::OUTPUT_NAME.to_string()]);
    }

    #[test]
    fn test_runs_fixture_graph() {
        let backend = load();
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
        let err = TractBackend::from_bytes_with_shape(b"not an onnx graph", &fixture::INPUT_SHAPE)
            .err()
            .unwrap();
        assert!(matches!(err, InferenceError::ModelLoad(_)), "{err}");
    }
}
