//! Subcommands.

pub mod classify;
pub mod config;
pub mod inspect;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use mriscan_core::{Classifier, LoadOutcome, OrtBackend, ScanConfig, load_native_backend};

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mriscan")
        .join("config.json")
}

/// Load the config at `path`, or the default file if it exists, or defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<ScanConfig> {
    if let Some(path) = path {
        return Ok(ScanConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config from {}", default_path.display());
        Ok(ScanConfig::from_file(&default_path)?)
    } else {
        Ok(ScanConfig::default())
    }
}

pub fn spinner(msg: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Drive `future` to completion on a fresh runtime.
///
/// The runtime is shut down without waiting for blocking tasks, so a forward
/// pass that outlived its deadline cannot keep the process alive.
pub fn block_on_detached<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

/// Build a classifier for `config` and load its model off the async runtime.
pub async fn load_classifier(config: &ScanConfig) -> anyhow::Result<Arc<Classifier<OrtBackend>>> {
    if !config.model.path.exists() {
        anyhow::bail!(
            "Model not found at {}.\n\n\
             Pass --model <PATH> or set model.path with 'mriscan config set'.",
            config.model.path.display()
        );
    }

    let classifier = Arc::new(Classifier::from_config(config));
    let model = config.model.clone();

    let pb = spinner("Loading model...");
    let outcome = {
        let classifier = Arc::clone(&classifier);
        tokio::task::spawn_blocking(move || classifier.load_with(|| load_native_backend(&model)))
            .await?
    };
    pb.finish_and_clear();

    match outcome {
        Ok(LoadOutcome::Loaded) | Ok(LoadOutcome::AlreadyLoaded) => Ok(classifier),
        Ok(LoadOutcome::InProgress) => anyhow::bail!("Model is still loading"),
        Err(e) => anyhow::bail!(e.user_message()),
    }
}
