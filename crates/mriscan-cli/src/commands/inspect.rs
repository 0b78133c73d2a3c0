//! Inspect command - load the model and describe it.

use std::path::PathBuf;

use clap::Args;
use console::style;

use mriscan_core::preprocess::INPUT_SHAPE;
use mriscan_core::{InferenceBackend, TumorClass};

use super::{load_classifier, load_config};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Model file (overrides model.path from the config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Do not try GPU execution providers
    #[arg(long)]
    cpu: bool,
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(model) = args.model {
        config.model.path = model;
    }
    if args.cpu {
        config.model.prefer_gpu = false;
    }

    let classifier = load_classifier(&config).await?;
    let backend = classifier
        .session()
        .backend()
        .ok_or_else(|| anyhow::anyhow!("Model did not reach the ready state"))?;

    println!("{} {}", style("Model:").bold(), config.model.path.display());
    println!("{} {}", style("Execution:").bold(), backend.execution_provider());
    println!("{} {:?}", style("Inputs:").bold(), backend.input_names());
    println!("{} {:?}", style("Outputs:").bold(), backend.output_names());
    println!("{} {:?}", style("Expected input shape:").bold(), INPUT_SHAPE);

    let labels: Vec<&str> = TumorClass::ALL.iter().map(|c| c.as_str()).collect();
    println!("{} {}", style("Labels:").bold(), labels.join(", "));

    Ok(())
}
