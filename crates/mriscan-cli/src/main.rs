//! CLI application for brain MRI tumor classification.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{classify, config, inspect};

/// Brain MRI tumor classifier - glioma, meningioma, pituitary or no tumor
#[derive(Parser)]
#[command(name = "mriscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single MRI image
    Classify(classify::ClassifyArgs),

    /// Show model inputs, outputs and execution path
    Inspect(inspect::InspectArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config;
    commands::block_on_detached(async move {
        let config_path = config_path.as_deref();
        match cli.command {
            Commands::Classify(args) => classify::run(args, config_path).await,
            Commands::Inspect(args) => inspect::run(args, config_path).await,
            Commands::Config(args) => config::run(args, config_path).await,
        }
    })?
}
