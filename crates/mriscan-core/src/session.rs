//! Lifecycle of the loaded network.
//!
//! A [`ModelSession`] moves through `unloaded -> loading -> ready` or
//! `unloaded -> loading -> failed`. A failed session goes back to `loading`
//! only when a caller asks for another load; nothing ever returns to
//! `unloaded`. The `loading` transition is a compare-and-swap, so two
//! concurrent load requests never build two sessions.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

use mriscan_inference::InferenceBackend;
use tracing::{debug, info, warn};

use crate::error::{PostprocessError, Result, ScanError};
use crate::preprocess::ImageTensor;

const UNLOADED: u8 = 0;
const LOADING: u8 = 1;
const READY: u8 = 2;
const FAILED: u8 = 3;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl ModelStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            LOADING => ModelStatus::Loading,
            READY => ModelStatus::Ready,
            FAILED => ModelStatus::Failed,
            _ => ModelStatus::Unloaded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelStatus::Unloaded => "unloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Ready => "ready",
            ModelStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a `load()` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// This call built the session.
    Loaded,
    /// The session was already ready.
    AlreadyLoaded,
    /// Another load is running; this call did nothing.
    InProgress,
}

/// Holds the network once it is loaded.
pub struct ModelSession<B> {
    state: AtomicU8,
    backend: OnceLock<B>,
    load_error: Mutex<Option<String>>,
}

impl<B: InferenceBackend> ModelSession<B> {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNLOADED),
            backend: OnceLock::new(),
            load_error: Mutex::new(None),
        }
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ModelStatus::Ready
    }

    /// The loaded backend, if the session is ready.
    pub fn backend(&self) -> Option<&B> {
        if self.is_ready() {
            self.backend.get()
        } else {
            None
        }
    }

    /// Message of the most recent failed load.
    pub fn last_load_error(&self) -> Option<String> {
        self.load_error.lock().ok().and_then(|e| e.clone())
    }

    /// Claim the `loading` state.
    ///
    /// Returns `Err` with the reason when there is nothing to do: the session
    /// is already ready, or another load holds the claim.
    pub fn begin_load(&self) -> std::result::Result<LoadGuard<'_, B>, LoadOutcome> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            match current {
                READY => {
                    debug!("Model already loaded");
                    return Err(LoadOutcome::AlreadyLoaded);
                }
                LOADING => {
                    debug!("Model is currently loading");
                    return Err(LoadOutcome::InProgress);
                }
                _ => {}
            }
            match self.state.compare_exchange(
                current,
                LOADING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(LoadGuard {
                        session: self,
                        finished: false,
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Load the network with `loader` unless it is loaded or loading already.
    pub fn load<F, E>(&self, loader: F) -> Result<LoadOutcome>
    where
        F: FnOnce() -> std::result::Result<B, E>,
        E: fmt::Display,
    {
        match self.begin_load() {
            Ok(guard) => guard.complete(loader()),
            Err(outcome) => Ok(outcome),
        }
    }

    /// Run one forward pass and return the raw logits.
    ///
    /// Fails with [`ScanError::NotLoaded`] unless the session is ready.
    pub fn run(&self, tensor: ImageTensor) -> Result<Vec<f32>> {
        let backend = self.backend().ok_or(ScanError::NotLoaded)?;

        let input_name = backend
            .input_names()
            .first()
            .map(String::as_str)
            .unwrap_or("input");

        let outputs = backend.run(&[(input_name, tensor.into_input())])?;

        let (name, output) = outputs
            .into_iter()
            .next()
            .ok_or_else(|| PostprocessError::MissingOutput("model produced no outputs".into()))?;

        let logits = output.to_vec();

        debug!("Output '{}' shape {:?}", name, output.shape());
        Ok(logits)
    }
}

impl<B: InferenceBackend> Default for ModelSession<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to finish a load, obtained from [`ModelSession::begin_load`].
///
/// Dropping the guard without calling [`LoadGuard::complete`] marks the
/// load as failed so a later call can retry.
pub struct LoadGuard<'a, B: InferenceBackend> {
    session: &'a ModelSession<B>,
    finished: bool,
}

impl<B: InferenceBackend> LoadGuard<'_, B> {
    /// Publish the result of the load.
    pub fn complete<E: fmt::Display>(
        mut self,
        result: std::result::Result<B, E>,
    ) -> Result<LoadOutcome> {
        self.finished = true;
        match result {
            Ok(backend) => {
                let fresh = self.session.backend.set(backend).is_ok();
                if let Ok(mut err) = self.session.load_error.lock() {
                    *err = None;
                }
                self.session.state.store(READY, Ordering::Release);
                if let Some(b) = self.session.backend.get() {
                    info!(
                        "Model loaded successfully (inputs: {:?}, outputs: {:?}, via {})",
                        b.input_names(),
                        b.output_names(),
                        b.execution_provider()
                    );
                }
                Ok(if fresh {
                    LoadOutcome::Loaded
                } else {
                    LoadOutcome::AlreadyLoaded
                })
            }
            Err(e) => {
                let msg = e.to_string();
                warn!("Failed to load model: {}", msg);
                self.session.fail(msg.clone());
                Err(ScanError::ModelLoad(msg))
            }
        }
    }
}

impl<B: InferenceBackend> Drop for LoadGuard<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Model load abandoned before completion");
            self.session.fail("load abandoned".to_string());
        }
    }
}

impl<B> ModelSession<B> {
    fn fail(&self, msg: String) {
        if let Ok(mut err) = self.load_error.lock() {
            *err = Some(msg);
        }
        self.state.store(FAILED, Ordering::Release);
    }
}
