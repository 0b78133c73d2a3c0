//! Classify command - run the model on a single image.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use tracing::{debug, info};

use mriscan_core::input::mime_for_path;
use mriscan_core::{Classifier, InferenceBackend, Prediction};

use super::{load_classifier, load_config, spinner};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Input image (PNG, JPEG, ...)
    #[arg(required = true)]
    input: PathBuf,

    /// Model file (overrides model.path from the config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Give up on the forward pass after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Do not try GPU execution providers
    #[arg(long)]
    cpu: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV, one row per class
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ClassifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(model) = &args.model {
        config.model.path = model.clone();
    }
    if args.cpu {
        config.model.prefer_gpu = false;
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    // Reject wrong types and oversized files before touching the model.
    let mime = mime_for_path(&args.input);
    let size = fs::metadata(&args.input)?.len();
    config
        .input
        .policy()
        .validate(size, mime)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Classifying {} ({}, {} bytes)", args.input.display(), mime, size);

    let bytes = fs::read(&args.input)?;
    let classifier = load_classifier(&config).await?;

    let pb = spinner("Running inference...");
    let prediction = predict(classifier, bytes, mime, args.timeout_ms).await;
    pb.finish_and_clear();
    let prediction = prediction?;

    println!("{}", format_prediction(&prediction, args.format)?);

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

async fn predict<B: InferenceBackend + 'static>(
    classifier: std::sync::Arc<Classifier<B>>,
    bytes: Vec<u8>,
    mime: &'static str,
    timeout_ms: Option<u64>,
) -> anyhow::Result<Prediction> {
    let task = tokio::task::spawn_blocking(move || classifier.predict_bytes(&bytes, mime));

    // The blocking task keeps running after a timeout; its result is dropped
    // and the runtime does not wait for it on shutdown.
    let joined = match timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), task)
            .await
            .map_err(|_| anyhow::anyhow!("Inference timed out after {} ms", ms))?,
        None => task.await,
    };

    joined?.map_err(|e| anyhow::anyhow!(e.user_message()))
}

fn format_prediction(prediction: &Prediction, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(prediction)?),
        OutputFormat::Csv => format_csv(prediction),
        OutputFormat::Text => Ok(format_text(prediction)),
    }
}

fn format_csv(prediction: &Prediction) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["rank", "class", "confidence"])?;
    for (i, score) in prediction.predictions.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            score.class_name.to_string(),
            format!("{:.6}", score.confidence),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data.trim_end().to_string())
}

fn format_text(prediction: &Prediction) -> String {
    let top = prediction.top_prediction;
    let mut output = String::new();

    output.push_str(&format!(
        "{} {} ({:.1}%)\n",
        style("Prediction:").bold(),
        style(top.class_name.display_name()).green(),
        top.confidence * 100.0
    ));
    output.push_str(&format!(
        "Inference time: {:.2} ms\n\n",
        prediction.inference_time_ms
    ));

    for score in &prediction.predictions {
        let bar = "#".repeat((score.confidence * 30.0).round() as usize);
        output.push_str(&format!(
            "  {:<11} {:>6.2}%  {}\n",
            score.class_name.display_name(),
            score.confidence * 100.0,
            bar
        ));
    }

    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::block_on_detached;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use mriscan_core::{InferenceError, InputTensor, OutputTensor, TumorClass};
    use std::io::Cursor;
    use std::sync::Arc;

    /// Engine that never finishes in time.
    struct StalledBackend;

    impl InferenceBackend for StalledBackend {
        fn run(
            &self,
            _inputs: &[(&str, InputTensor)],
        ) -> Result<Vec<(String, OutputTensor)>, InferenceError> {
            std::thread::sleep(Duration::from_secs(5));
            Err(InferenceError::InferenceFailed("stalled".into()))
        }

        fn input_names(&self) -> &[String] {
            &[]
        }

        fn output_names(&self) -> &[String] {
            &[]
        }

        fn execution_provider(&self) -> &str {
            "stalled"
        }
    }

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(16, 16))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn sample() -> Prediction {
        Prediction::from_logits(&[2.0, 1.0, 0.1, 0.1], 4.25).unwrap()
    }

    #[test]
    fn test_csv_rows() {
        let csv = format_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "rank,class,confidence");
        assert!(lines[1].starts_with("1,glioma,"));
    }

    #[test]
    fn test_text_summary() {
        let text = format_text(&sample());
        assert!(text.contains(TumorClass::Glioma.display_name()));
        assert!(text.contains("Inference time: 4.25 ms"));
        assert!(text.contains("No Tumor"));
    }

    #[test]
    fn test_timeout_does_not_wait_for_the_engine() {
        let classifier = Arc::new(Classifier::new());
        classifier.load_with(|| Ok::<_, String>(StalledBackend)).unwrap();

        let start = Instant::now();
        let result = block_on_detached(predict(classifier, png(), "image/png", Some(100))).unwrap();
        let elapsed = start.elapsed();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out after 100 ms"), "{err}");
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn test_json_shape() {
        let json = format_prediction(&sample(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["topPrediction"]["className"], "glioma");
    }
}
