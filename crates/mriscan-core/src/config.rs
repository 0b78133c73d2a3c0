//! Configuration structures for the classification pipeline.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use mriscan_inference::BackendOptions;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::input::{DEFAULT_MAX_BYTES, InputPolicy};

/// Main configuration for mriscan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Model artifact and runtime settings.
    pub model: ModelConfig,

    /// Upload limits.
    pub input: InputConfig,

    /// Image preprocessing settings.
    pub preprocess: PreprocessConfig,
}

/// Model artifact and execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX artifact.
    pub path: PathBuf,

    /// Try a GPU execution provider first.
    pub prefer_gpu: bool,

    /// Number of intra-op CPU threads.
    pub intra_threads: usize,

    /// Apply full graph optimization when loading.
    pub optimize: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model/brain_tumor_model.onnx"),
            prefer_gpu: true,
            intra_threads: 4,
            optimize: true,
        }
    }
}

impl ModelConfig {
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            prefer_gpu: self.prefer_gpu,
            intra_threads: self.intra_threads,
            optimize: self.optimize,
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Largest accepted file, in bytes.
    pub max_file_bytes: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl InputConfig {
    pub fn policy(&self) -> InputPolicy {
        InputPolicy::new(self.max_file_bytes)
    }
}

/// Image preprocessing settings.
///
/// Normalization constants are part of the model contract and are not
/// configurable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Resampling filter used for the stretch resize.
    pub resize_filter: ResizeFilter,
}

/// Resampling filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear, closest to a browser canvas `drawImage`.
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ScanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ScanError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ScanError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.input.max_file_bytes == 0 {
            return Err(ScanError::Config("input.max_file_bytes must be positive".into()));
        }
        if self.model.intra_threads == 0 {
            return Err(ScanError::Config("model.intra_threads must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.input.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(config.model.path, PathBuf::from("model/brain_tumor_model.onnx"));
        assert_eq!(config.preprocess.resize_filter, ResizeFilter::Triangle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "model": {"prefer_gpu": false},
            "preprocess": {"resize_filter": "lanczos3"}
        }"#;
        let config: ScanConfig = serde_json::from_str(json).unwrap();
        assert!(!config.model.prefer_gpu);
        assert_eq!(config.model.intra_threads, 4);
        assert_eq!(config.preprocess.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.input, InputConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = ScanConfig::default();
        config.input.max_file_bytes = 2048;
        config.save(&path).unwrap();

        let loaded = ScanConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"input": {"max_file_bytes": 0}}"#).unwrap();

        let err = ScanConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }
}
