//! The classification pipeline: validate, decode, preprocess, infer, rank.

use std::fmt;
use std::sync::Mutex;

use image::DynamicImage;
use mriscan_inference::InferenceBackend;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::input::InputPolicy;
use crate::postprocess::Prediction;
use crate::preprocess::{ImagePreprocessor, ImageTensor};
use crate::session::{LoadGuard, LoadOutcome, ModelSession, ModelStatus};

/// Image classifier around one [`ModelSession`].
///
/// Every failure is returned to the caller and also kept as
/// [`Classifier::last_error`] until the next successful call.
pub struct Classifier<B> {
    session: ModelSession<B>,
    preprocessor: ImagePreprocessor,
    policy: InputPolicy,
    last_error: Mutex<Option<String>>,
}

impl<B: InferenceBackend> Classifier<B> {
    /// Create a classifier with default preprocessing and upload limits.
    pub fn new() -> Self {
        Self {
            session: ModelSession::new(),
            preprocessor: ImagePreprocessor::new(),
            policy: InputPolicy::default(),
            last_error: Mutex::new(None),
        }
    }

    /// Create a classifier using the input and preprocessing sections of `config`.
    pub fn from_config(config: &ScanConfig) -> Self {
        let preprocessor = ImagePreprocessor::new().with_filter(config.preprocess.resize_filter);
        Self::new()
            .with_policy(config.input.policy())
            .with_preprocessor(preprocessor)
    }

    pub fn with_policy(mut self, policy: InputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn session(&self) -> &ModelSession<B> {
        &self.session
    }

    pub fn policy(&self) -> InputPolicy {
        self.policy
    }

    pub fn status(&self) -> ModelStatus {
        self.session.status()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// User-facing message of the last failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    /// Load the network unless it is loaded or loading already.
    pub fn load_with<F, E>(&self, loader: F) -> Result<LoadOutcome>
    where
        F: FnOnce() -> std::result::Result<B, E>,
        E: fmt::Display,
    {
        self.record(self.session.load(loader))
    }

    /// Claim the loading state for an asynchronous load.
    pub fn begin_load(&self) -> std::result::Result<LoadGuard<'_, B>, LoadOutcome> {
        self.session.begin_load()
    }

    /// Publish the result of a load started with [`Classifier::begin_load`].
    pub fn complete_load<E: fmt::Display>(
        &self,
        guard: LoadGuard<'_, B>,
        result: std::result::Result<B, E>,
    ) -> Result<LoadOutcome> {
        self.record(guard.complete(result))
    }

    /// Check an upload against the input policy without processing it.
    pub fn validate(&self, len: u64, mime: &str) -> Result<()> {
        let result = self.policy.validate(len, mime).map_err(ScanError::from);
        self.record(result)
    }

    /// Classify an encoded image.
    pub fn predict_bytes(&self, bytes: &[u8], mime: &str) -> Result<Prediction> {
        let result = self.run_bytes(bytes, mime);
        self.record(result)
    }

    /// Classify an already decoded image.
    pub fn predict_image(&self, image: &DynamicImage) -> Result<Prediction> {
        let result = self.run_image(image);
        self.record(result)
    }

    /// Classify a raw RGBA buffer.
    pub fn predict_rgba(&self, width: u32, height: u32, data: Vec<u8>) -> Result<Prediction> {
        let result = self
            .preprocessor
            .from_rgba(width, height, data)
            .map_err(ScanError::from)
            .and_then(|image| self.run_image(&image));
        self.record(result)
    }

    /// Classify a tensor produced by [`ImagePreprocessor::preprocess`].
    pub fn predict_tensor(&self, tensor: ImageTensor) -> Result<Prediction> {
        let result = self.run_tensor(tensor);
        self.record(result)
    }

    fn run_bytes(&self, bytes: &[u8], mime: &str) -> Result<Prediction> {
        self.policy.validate(bytes.len() as u64, mime)?;
        self.ensure_ready()?;
        let image = self.preprocessor.decode(bytes)?;
        self.run_image(&image)
    }

    fn run_image(&self, image: &DynamicImage) -> Result<Prediction> {
        self.ensure_ready()?;
        let tensor = self.preprocessor.preprocess(image)?;
        self.run_tensor(tensor)
    }

    fn run_tensor(&self, tensor: ImageTensor) -> Result<Prediction> {
        let stopwatch = Stopwatch::start();
        let logits = self.session.run(tensor)?;
        let elapsed = stopwatch.elapsed_ms();

        let prediction = Prediction::from_logits(&logits, elapsed)?;
        info!(
            "Inference completed in {:.2} ms, top prediction: {} {:.4}",
            elapsed, prediction.top_prediction.class_name, prediction.top_prediction.confidence
        );
        Ok(prediction)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.session.is_ready() {
            Ok(())
        } else {
            Err(ScanError::NotLoaded)
        }
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.clear_error(),
            Err(e) => {
                warn!("{:?} error: {}", e.category(), e);
                if let Ok(mut last) = self.last_error.lock() {
                    *last = Some(e.user_message());
                }
            }
        }
        result
    }

    fn clear_error(&self) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }
    }
}

impl<B: InferenceBackend> Default for Classifier<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock timer that also works on `wasm32-unknown-unknown`.
struct Stopwatch {
    #[cfg(not(target_arch = "wasm32"))]
    start: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    start: f64,
}

impl Stopwatch {
    fn start() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            start: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            start: js_sys::Date::now(),
        }
    }

    fn elapsed_ms(&self) -> f64 {
        #[cfg(not(target_arch = "wasm32"))]
        let ms = self.start.elapsed().as_secs_f64() * 1000.0;
        #[cfg(target_arch = "wasm32")]
        let ms = js_sys::Date::now() - self.start;
        debug!("Forward pass took {:.3} ms", ms);
        ms
    }
}
