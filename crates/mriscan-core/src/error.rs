//! Error types for the mriscan-core library.

use thiserror::Error;

/// Main error type for the mriscan pipeline.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Input rejected before any processing.
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// Image could not be turned into a tensor.
    #[error("preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    /// Network output could not be turned into a prediction.
    #[error("postprocessing failed: {0}")]
    Postprocess(#[from] PostprocessError),

    /// Error from the inference layer during a forward pass.
    #[error("inference error: {0}")]
    Inference(#[from] mriscan_inference::InferenceError),

    /// The model artifact could not be loaded.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// A prediction was requested before the session reached `ready`.
    #[error("model not loaded")]
    NotLoaded,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse error classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wrong type or size; nothing was processed.
    Input,
    /// Loading the network failed; predictions are refused until a reload.
    ModelLoad,
    /// The session is not ready yet.
    NotReady,
    /// A single prediction failed; the session is unaffected.
    Prediction,
    /// Bad configuration or local I/O.
    Setup,
}

impl ScanError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScanError::Input(_) => ErrorCategory::Input,
            ScanError::ModelLoad(_) => ErrorCategory::ModelLoad,
            ScanError::NotLoaded => ErrorCategory::NotReady,
            ScanError::Preprocess(_) | ScanError::Postprocess(_) | ScanError::Inference(_) => {
                ErrorCategory::Prediction
            }
            ScanError::Io(_) | ScanError::Config(_) => ErrorCategory::Setup,
        }
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::Input(e) => e.to_string(),
            ScanError::NotLoaded => "Model not loaded. Load the model first.".to_string(),
            ScanError::ModelLoad(msg) => format!("Failed to load model: {msg}"),
            other => format!("Prediction failed: {other}"),
        }
    }
}

/// Errors raised by upload validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The MIME type is not an image type.
    #[error("please upload an image file (got {0})")]
    UnsupportedType(String),

    /// The payload exceeds the configured cap.
    #[error("file size must be at most {max} bytes (got {size})")]
    TooLarge { size: u64, max: u64 },

    /// Zero-length payload.
    #[error("file is empty")]
    Empty,
}

/// Errors raised while building the input tensor.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// A raw pixel buffer does not match its declared dimensions.
    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),
}

/// Errors raised while turning logits into a ranked distribution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostprocessError {
    /// Logit count differs from the label count.
    #[error("expected {expected} logits, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A logit is NaN or infinite.
    #[error("logit {index} is not finite ({value})")]
    NonFinite { index: usize, value: f32 },

    /// The network produced no usable output tensor.
    #[error("missing output: {0}")]
    MissingOutput(String),
}

/// Result type for the mriscan library.
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_categories() {
        assert_eq!(ScanError::from(InputError::Empty).category(), ErrorCategory::Input);
        assert_eq!(ScanError::NotLoaded.category(), ErrorCategory::NotReady);
        assert_eq!(
            ScanError::ModelLoad("missing".into()).category(),
            ErrorCategory::ModelLoad
        );
        assert_eq!(
            ScanError::from(PostprocessError::LengthMismatch { expected: 4, actual: 3 }).category(),
            ErrorCategory::Prediction
        );
    }

    #[test]
    fn test_user_message() {
        let err = ScanError::from(InputError::UnsupportedType("text/plain".into()));
        assert_eq!(err.user_message(), "please upload an image file (got text/plain)");
        assert!(ScanError::NotLoaded.user_message().starts_with("Model not loaded"));
    }
}
