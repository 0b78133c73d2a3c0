//! In-memory backend for unit tests.

use mriscan_inference::{InferenceBackend, InferenceError, InputTensor, OutputTensor};

/// Deterministic stand-in for the network.
///
/// Logit `i` for `i < 3` is the mean of input channel `i`; the last logit is
/// always zero. A black image therefore ranks `pituitary` first and a white
/// one ranks `glioma` first.
pub struct FakeBackend {
    input_names: Vec<String>,
    output_names: Vec<String>,
    failure: Option<String>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            input_names: vec!["input".to_string()],
            output_names: vec!["logits".to_string()],
            failure: None,
        }
    }

    /// A backend whose every forward pass fails with `msg`.
    pub fn failing(msg: &str) -> Self {
        Self {
            failure: Some(msg.to_string()),
            ..Self::new()
        }
    }
}

impl InferenceBackend for FakeBackend {
    fn run(
        &self,
        inputs: &[(&str, InputTensor)],
    ) -> mriscan_inference::Result<Vec<(String, OutputTensor)>> {
        if let Some(msg) = &self.failure {
            return Err(InferenceError::InferenceFailed(msg.clone()));
        }

        let (_, tensor) = inputs
            .first()
            .ok_or_else(|| InferenceError::InvalidInput("no inputs".into()))?;
        let values = tensor.to_vec();
        let plane = values.len() / 3;
        let mut logits: Vec<f32> = values
            .chunks(plane)
            .take(3)
            .map(|c| c.iter().sum::<f32>() / plane as f32)
            .collect();
        logits.push(0.0);

        let out = OutputTensor::from_shape_vec(&[1, 4], logits)?;
        Ok(vec![(self.output_names[0].clone(), out)])
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn execution_provider(&self) -> &str {
        "fake"
    }
}
