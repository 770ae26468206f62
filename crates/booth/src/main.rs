//! Booth CLI - snap a photo, describe a style, get a generated image back.
//!
//! Every photo is kept in a local durable store, so results survive restarts
//! and can be regenerated or exported later.
//!
//! # Usage
//!
//! ```bash
//! # Capture under a preset style
//! booth capture selfie.jpg --preset vintage --output vintage.png
//!
//! # Capture several images under a custom prompt
//! booth capture a.jpg b.jpg --prompt "Turn this into a watercolor painting"
//!
//! # Browse and manage results
//! booth photos list
//! booth photos regenerate <id>
//! booth photos frames ./frames
//!
//! # Provider credentials
//! booth config set-key huggingface
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Booth - prompt-driven image generation with a durable photo store.
#[derive(Parser, Debug)]
#[command(name = "booth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate images from input photos under the current prompt
    Capture(cli::capture::CaptureArgs),

    /// List, regenerate, delete, and export photos
    Photos(cli::photos::PhotosArgs),

    /// Set the current prompt, apply presets, browse prompt history
    Prompt(cli::prompt::PromptArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match booth_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `booth config path`."
            );
            booth_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Booth v{}", booth_core::VERSION);

    match cli.command {
        Commands::Capture(args) => cli::capture::execute(args, config).await,
        Commands::Photos(args) => cli::photos::execute(args, config).await,
        Commands::Prompt(args) => cli::prompt::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
