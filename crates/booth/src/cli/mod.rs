//! CLI command implementations.

pub mod capture;
pub mod config;
pub mod photos;
pub mod prompt;
pub mod theme;

use anyhow::Context;
use booth_core::{Booth, Config, ImageBlob, PhotoId, ProviderKind};
use std::path::{Path, PathBuf};

/// Open the durable store and rehydrate, applying per-invocation provider overrides.
pub async fn open_booth(
    config: Config,
    provider: Option<ProviderKind>,
    credential: Option<String>,
) -> anyhow::Result<Booth> {
    let mut builder = Booth::builder(config);
    if let Some(credential) = credential.filter(|c| !c.trim().is_empty()) {
        builder = builder.with_credential(credential);
    }
    let booth = builder.build().await.context("Failed to open photo store")?;
    booth.rehydrate().await.context("Failed to load photo store")?;
    if let Some(kind) = provider {
        booth.select_provider(kind).await;
    }
    Ok(booth)
}

pub fn parse_photo_id(raw: &str) -> anyhow::Result<PhotoId> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid photo id: {raw}"))
}

pub fn read_image(path: &Path) -> anyhow::Result<ImageBlob> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("{} is empty", path.display());
    }
    Ok(ImageBlob::sniff(bytes))
}

/// Write `blob` to `path`, creating parent directories.
pub fn write_image(path: &Path, blob: &ImageBlob) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &blob.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("Wrote {} ({} bytes)", path.display(), blob.bytes.len());
    Ok(())
}

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
