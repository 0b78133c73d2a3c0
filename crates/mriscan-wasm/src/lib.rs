//! WASM bindings for brain MRI classification.
//!
//! This crate provides WebAssembly bindings for use in browsers. The network
//! runs on the CPU through tract; predictions are returned as plain JS objects
//! shaped `{ predictions, topPrediction, inferenceTime }`.

use std::rc::Rc;

use js_sys::{Array, Promise, Uint8Array};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};
use web_sys::{ImageData, Response};

use mriscan_core::{
    Classifier as CoreClassifier, InputPolicy, LoadOutcome, Prediction, ScanError, TractBackend,
    TumorClass, load_wasm_backend,
};

/// Where the model is served from when `loadFromUrl` gets no URL.
const DEFAULT_MODEL_URL: &str = "/model/brain_tumor_model.onnx";

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Class labels in output order.
#[wasm_bindgen]
pub fn labels() -> Array {
    TumorClass::ALL
        .iter()
        .map(|class| JsValue::from_str(class.as_str()))
        .collect()
}

/// Check a file's size and MIME type before reading it.
#[wasm_bindgen(js_name = validateFile)]
pub fn validate_file(size: f64, mime: &str) -> Result<(), JsValue> {
    InputPolicy::default()
        .validate(size as u64, mime)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Tumor classifier for browser use.
///
/// One instance owns one model session. `load` and `loadFromUrl` are
/// idempotent: calls made while the model is ready or loading do nothing.
#[wasm_bindgen]
pub struct Classifier {
    inner: Rc<CoreClassifier<TractBackend>>,
}

#[wasm_bindgen]
impl Classifier {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(CoreClassifier::new()),
        }
    }

    /// Load the model from ONNX bytes.
    ///
    /// Resolves to `"loaded"`, `"already_loaded"` or `"in_progress"`.
    #[wasm_bindgen]
    pub fn load(&self, bytes: &[u8]) -> Result<String, JsValue> {
        self.inner
            .load_with(|| load_wasm_backend(bytes))
            .map(|outcome| outcome_name(outcome).to_string())
            .map_err(to_js_error)
    }

    /// Fetch the model and load it. Returns a promise of the load outcome.
    #[wasm_bindgen(js_name = loadFromUrl)]
    pub fn load_from_url(&self, url: Option<String>) -> Promise {
        let inner = Rc::clone(&self.inner);
        let url = url.unwrap_or_else(|| DEFAULT_MODEL_URL.to_string());

        future_to_promise(async move {
            let guard = match inner.begin_load() {
                Ok(guard) => guard,
                Err(outcome) => return Ok(JsValue::from_str(outcome_name(outcome))),
            };

            tracing::info!("Fetching model from {}", url);
            let result = fetch_bytes(&url)
                .await
                .and_then(|bytes| load_wasm_backend(&bytes).map_err(|e| e.to_string()));

            inner
                .complete_load(guard, result)
                .map(|outcome| JsValue::from_str(outcome_name(outcome)))
                .map_err(to_js_error)
        })
    }

    /// One of `"unloaded"`, `"loading"`, `"ready"`, `"failed"`.
    #[wasm_bindgen]
    pub fn status(&self) -> String {
        self.inner.status().as_str().to_string()
    }

    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Message of the last failure, cleared by the next successful call.
    #[wasm_bindgen(js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }

    /// Classify an encoded image (PNG, JPEG, ...).
    #[wasm_bindgen]
    pub fn predict(&self, bytes: &[u8], mime: &str) -> Result<JsValue, JsValue> {
        let prediction = self.inner.predict_bytes(bytes, mime).map_err(to_js_error)?;
        to_js_prediction(&prediction)
    }

    /// Classify pixels read from a canvas.
    #[wasm_bindgen(js_name = predictImageData)]
    pub fn predict_image_data(&self, image: &ImageData) -> Result<JsValue, JsValue> {
        let prediction = self
            .inner
            .predict_rgba(image.width(), image.height(), image.data().0)
            .map_err(to_js_error)?;
        to_js_prediction(&prediction)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome_name(outcome: LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Loaded => "loaded",
        LoadOutcome::AlreadyLoaded => "already_loaded",
        LoadOutcome::InProgress => "in_progress",
    }
}

fn to_js_error(err: ScanError) -> JsValue {
    JsValue::from_str(&err.user_message())
}

fn to_js_prediction(prediction: &Prediction) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(prediction).map_err(|e| JsValue::from_str(&e.to_string()))
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, String> {
    let window = web_sys::window().ok_or("no window available")?;

    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(describe)?;
    let response: Response = response.dyn_into().map_err(describe)?;
    if !response.ok() {
        return Err(format!("HTTP {} fetching {}", response.status(), url));
    }

    let buffer = JsFuture::from(response.array_buffer().map_err(describe)?)
        .await
        .map_err(describe)?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

fn describe(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_labels_in_output_order() {
        let labels: Vec<String> = labels().iter().filter_map(|v| v.as_string()).collect();
        assert_eq!(labels, ["glioma", "meningioma", "notumor", "pituitary"]);
    }

    #[wasm_bindgen_test]
    fn test_validate_file() {
        assert!(validate_file(10.0 * 1024.0 * 1024.0, "image/png").is_ok());
        assert!(validate_file(10.0 * 1024.0 * 1024.0 + 1.0, "image/png").is_err());
        assert!(validate_file(100.0, "application/pdf").is_err());
    }

    #[wasm_bindgen_test]
    fn test_predict_before_load() {
        let classifier = Classifier::new();
        assert_eq!(classifier.status(), "unloaded");
        assert!(!classifier.is_ready());

        let err = classifier.predict(&[0x89, b'P', b'N', b'G'], "image/png").unwrap_err();
        assert!(err.as_string().unwrap().starts_with("Model not loaded"));
        assert!(classifier.last_error().is_some());
    }

    #[wasm_bindgen_test]
    fn test_load_garbage_fails() {
        let classifier = Classifier::new();
        assert!(classifier.load(b"not a model").is_err());
        assert_eq!(classifier.status(), "failed");
        assert!(classifier.last_error().unwrap().starts_with("Failed to load model"));
    }
}
