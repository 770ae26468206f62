//! The `booth capture` command.

use super::theme;
use super::{expand_path, open_booth, read_image, write_image};
use anyhow::Context;
use booth_core::{Booth, CaptureOutcome, Config, ImageBlob, PhotoId, ProviderKind};
use clap::Args;
use futures_util::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments for the `capture` command.
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Image file(s) to transform
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Prompt to apply (becomes the current prompt)
    #[arg(short, long, conflicts_with = "preset")]
    pub prompt: Option<String>,

    /// Built-in style: vintage, cartoon, bw, pop-art
    #[arg(long)]
    pub preset: Option<String>,

    /// Provider for this run (gemini, huggingface)
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// API key for providers that take a caller-supplied credential
    #[arg(long, env = "BOOTH_HF_KEY", hide_env_values = true)]
    pub hf_key: Option<String>,

    /// Write generated images here: a file for a single input, else a directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the capture command.
pub async fn execute(args: CaptureArgs, config: Config) -> anyhow::Result<()> {
    let images = args
        .inputs
        .iter()
        .map(|path| -> anyhow::Result<(PathBuf, ImageBlob)> {
            Ok((path.clone(), read_image(&expand_path(path))?))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let booth = open_booth(config, args.provider, args.hf_key).await?;
    if let Some(preset) = &args.preset {
        booth.apply_preset(preset).await?;
    }
    if let Some(prompt) = &args.prompt {
        booth.set_prompt(prompt.as_str()).await?;
    }
    if booth.snapshot().current_prompt.trim().is_empty() {
        anyhow::bail!("No prompt set. Pass --prompt or --preset, or run `booth prompt set <text>`.");
    }

    let kind = booth.selected_provider().await;
    if !booth.is_provider_configured(kind).await {
        anyhow::bail!(
            "The {kind} provider has no API key. Set one with `booth config set-key {kind}`{}.",
            if kind == ProviderKind::HuggingFace {
                " or pass --hf-key"
            } else {
                ""
            }
        );
    }

    tracing::info!(
        "Capturing {} image(s) with {kind}: \"{}\"",
        images.len(),
        booth.snapshot().current_prompt
    );
    let results = run_captures(&booth, images).await?;

    let total = results.len();
    let mut failed = 0usize;
    for (path, result) in &results {
        match result {
            Ok(CaptureOutcome::Ready(id)) => {
                let written = match &args.output {
                    Some(output) => Some(write_output(&booth, *id, output, total)?),
                    None => None,
                };
                println!(
                    "{} {}  {}{}",
                    theme::success().apply_to("✓"),
                    id,
                    path.display(),
                    written
                        .map(|p| format!(" → {}", p.display()))
                        .unwrap_or_default()
                );
            }
            Ok(CaptureOutcome::Cancelled(id)) => {
                println!(
                    "{} {}  {} (cancelled)",
                    theme::dim().apply_to("-"),
                    id,
                    path.display()
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("✗ {}: {e}", path.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} capture(s) failed");
    }
    Ok(())
}

/// Capture every image concurrently; Ctrl+C cancels whatever is in flight.
async fn run_captures(
    booth: &Booth,
    images: Vec<(PathBuf, ImageBlob)>,
) -> anyhow::Result<Vec<(PathBuf, booth_core::Result<CaptureOutcome>)>> {
    let spinner = create_spinner(images.len() as u64)?;
    spinner.set_message("generating...");

    let captures = images.into_iter().map(|(path, image)| {
        let spinner = &spinner;
        async move {
            let result = booth.capture(image).await;
            spinner.inc(1);
            (path, result)
        }
    });
    let all = join_all(captures);
    tokio::pin!(all);

    let results = loop {
        tokio::select! {
            results = &mut all => break results,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                spinner.set_message("cancelling...");
                booth.cancel_in_flight().await;
            }
        }
    };

    spinner.finish_and_clear();
    Ok(results)
}

/// Write a Ready photo's output under `output`, returning the path written.
fn write_output(booth: &Booth, id: PhotoId, output: &Path, total: usize) -> anyhow::Result<PathBuf> {
    let state = booth.snapshot();
    let blob = state
        .photo(id)
        .and_then(|photo| photo.output.clone())
        .with_context(|| format!("Photo {id} has no output"))?;

    let output = expand_path(output);
    let path = output_path(&output, total, id, blob.extension());
    write_image(&path, &blob)?;
    Ok(path)
}

/// A single capture writes to `output` itself unless it is an existing
/// directory; several captures always go into `output` as `<id>.<ext>`.
fn output_path(output: &Path, total: usize, id: PhotoId, extension: &str) -> PathBuf {
    if total == 1 && !output.is_dir() {
        output.to_path_buf()
    } else {
        output.join(format!("{id}.{extension}"))
    }
}

fn create_spinner(total: u64) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}
