//! The `booth photos` command.

use super::theme;
use super::{expand_path, open_booth, parse_photo_id, write_image};
use anyhow::Context;
use booth_core::{BoothState, Config, PhotoRecord, RegenerateOutcome};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the `photos` command.
#[derive(Args, Debug)]
pub struct PhotosArgs {
    #[command(subcommand)]
    pub command: PhotosCommand,
}

/// Listing format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum PhotosCommand {
    /// List stored photos, most recent first
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        format: ListFormat,
    },

    /// Generate a new output for a stored photo, keeping the old one on failure
    Regenerate {
        id: String,

        /// API key for providers that take a caller-supplied credential
        #[arg(long, env = "BOOTH_HF_KEY", hide_env_values = true)]
        hf_key: Option<String>,

        /// Also write the new output to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete photos and their stored images
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Write a photo's generated image (or its input) to a file
    Export {
        id: String,

        path: PathBuf,

        /// Export the original input instead of the generated output
        #[arg(long)]
        input: bool,
    },

    /// Write every ready photo as an input/output frame pair into a directory
    Frames { dir: PathBuf },
}

/// One row of `photos list --format json`.
#[derive(Debug, Serialize)]
struct PhotoSummary {
    id: String,
    status: String,
    provider: String,
    prompt: String,
    version: u64,
    busy: bool,
    output_mime: Option<String>,
}

impl From<&PhotoRecord> for PhotoSummary {
    fn from(photo: &PhotoRecord) -> Self {
        Self {
            id: photo.id.to_string(),
            status: format!("{:?}", photo.status).to_lowercase(),
            provider: photo.provider.to_string(),
            prompt: photo.prompt_used.clone(),
            version: photo.version,
            busy: photo.is_busy(),
            output_mime: photo.output.as_ref().map(|o| o.mime_type.clone()),
        }
    }
}

/// Execute the photos command.
pub async fn execute(args: PhotosArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        PhotosCommand::List { format } => {
            let booth = open_booth(config, None, None).await?;
            print_list(&booth.snapshot(), format)?;
        }

        PhotosCommand::Regenerate { id, hf_key, output } => {
            let id = parse_photo_id(&id)?;
            let booth = open_booth(config, None, hf_key).await?;
            match booth.regenerate(id).await? {
                RegenerateOutcome::Updated { version } => {
                    println!("Regenerated {id} (version {version})");
                    if let Some(path) = output {
                        let state = booth.snapshot();
                        let blob = state
                            .photo(id)
                            .and_then(|photo| photo.output.clone())
                            .with_context(|| format!("Photo {id} has no output"))?;
                        write_image(&expand_path(&path), &blob)?;
                    }
                }
                RegenerateOutcome::Cancelled => println!("Regeneration of {id} cancelled"),
            }
        }

        PhotosCommand::Delete { ids } => {
            let ids = ids
                .iter()
                .map(|raw| parse_photo_id(raw))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let booth = open_booth(config, None, None).await?;
            for id in ids {
                booth.delete(id).await?;
                println!("Deleted {id}");
            }
        }

        PhotosCommand::Export { id, path, input } => {
            let id = parse_photo_id(&id)?;
            let booth = open_booth(config, None, None).await?;
            let state = booth.snapshot();
            let photo = state
                .photo(id)
                .with_context(|| format!("Photo not found: {id}"))?;
            let blob = if input {
                photo.input.clone()
            } else {
                photo
                    .output
                    .clone()
                    .with_context(|| format!("Photo {id} has no output yet"))?
            };
            let path = expand_path(&path);
            write_image(&path, &blob)?;
            println!("Exported {id} to {}", path.display());
        }

        PhotosCommand::Frames { dir } => {
            let booth = open_booth(config, None, None).await?;
            let dir = expand_path(&dir);
            let photos = booth.ready_photos()?;
            for (index, photo) in photos.iter().enumerate() {
                let input = dir.join(format!("{index:03}-input.{}", photo.input.extension()));
                let output = dir.join(format!("{index:03}-output.{}", photo.output.extension()));
                write_image(&input, &photo.input)?;
                write_image(&output, &photo.output)?;
            }
            println!("Wrote {} frame pair(s) to {}", photos.len(), dir.display());
        }
    }

    Ok(())
}

fn print_list(state: &BoothState, format: ListFormat) -> anyhow::Result<()> {
    match format {
        ListFormat::Json => {
            let rows: Vec<PhotoSummary> = state.photos.iter().map(PhotoSummary::from).collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        ListFormat::Table => {
            if state.photos.is_empty() {
                println!("No photos yet. Create one with `booth capture <image>`.");
                return Ok(());
            }
            for photo in &state.photos {
                println!(
                    "{}  {:<11}  {:<8}  {}",
                    theme::highlight().apply_to(photo.id),
                    photo.provider.as_str(),
                    format!("{:?}", photo.status).to_lowercase(),
                    theme::dim().apply_to(truncate(&photo.prompt_used, 60))
                );
            }
        }
    }
    Ok(())
}

/// Shorten `text` to at most `max` characters, marking the cut with `…`.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use booth_core::{ImageBlob, PhotoId, PhotoStatus, ProviderKind};
    use std::sync::Arc;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("ééééé", 5), "ééééé");
    }

    #[test]
    fn test_summary_from_record() {
        let id = PhotoId::new();
        let photo = PhotoRecord {
            id,
            prompt_used: "make it pop art".to_string(),
            input: Arc::new(ImageBlob::new(vec![1], "image/jpeg")),
            output: Some(Arc::new(ImageBlob::new(vec![2], "image/png"))),
            provider: ProviderKind::HuggingFace,
            status: PhotoStatus::Ready,
            version: 2,
            regenerating: false,
        };

        let summary = PhotoSummary::from(&photo);
        assert_eq!(summary.id, id.to_string());
        assert_eq!(summary.status, "ready");
        assert_eq!(summary.provider, "huggingface");
        assert_eq!(summary.output_mime.as_deref(), Some("image/png"));
        assert!(!summary.busy);
    }
}
