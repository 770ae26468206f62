//! The `booth config` command for configuration management.

use super::theme;
use anyhow::Context;
use booth_core::{Config, ProviderKind};
use clap::{Args, Subcommand};
use dialoguer::Password;
use std::path::Path;
use toml_edit::DocumentMut;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Save a provider API key to the config file (prompts when omitted)
    SetKey {
        provider: ProviderKind,

        key: Option<String>,
    },

    /// Choose the provider used by default
    SetProvider { provider: ProviderKind },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load()?;
            let toml = config.to_toml()?;
            println!("{}", toml);
        }

        ConfigCommand::Path => {
            let path = Config::default_path();
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let config = Config::default();
            let toml = config.to_toml()?;
            std::fs::write(&path, toml)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::SetKey { provider, key } => {
            let key = match key {
                Some(key) => key,
                None => Password::with_theme(&theme::booth_theme())
                    .with_prompt(format!("{provider} API key"))
                    .interact()?,
            };
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("API key is empty");
            }

            let path = Config::default_path();
            edit_config(&path, |doc| set_provider_value(doc, Some(provider), "api_key", key))?;
            println!(
                "{}",
                theme::dim().apply_to(format!("Key saved to {}", path.display()))
            );
        }

        ConfigCommand::SetProvider { provider } => {
            let path = Config::default_path();
            edit_config(&path, |doc| {
                set_provider_value(doc, None, "selected", provider.as_str())
            })?;
            println!("Default provider set to {provider}");
        }
    }

    Ok(())
}

/// Apply `edit` to the config file, preserving comments and layout.
fn edit_config(path: &Path, edit: impl FnOnce(&mut DocumentMut)) -> anyhow::Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("{} is not valid TOML", path.display()))?;

    edit(&mut doc);

    // Refuse to write something the loader would reject.
    let updated = doc.to_string();
    let config: Config = toml::from_str(&updated).context("Edited config does not parse")?;
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, updated)?;
    tracing::debug!("Updated {}", path.display());
    Ok(())
}

/// Set `key = value` in `[provider]`, or in `[provider.<kind>]` when `kind` is given.
fn set_provider_value(doc: &mut DocumentMut, kind: Option<ProviderKind>, key: &str, value: &str) {
    if !doc.contains_key("provider") {
        doc["provider"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let Some(kind) = kind else {
        doc["provider"][key] = toml_edit::value(value);
        return;
    };

    let section = kind.as_str();
    if !doc["provider"]
        .as_table()
        .is_some_and(|t| t.contains_key(section))
    {
        doc["provider"][section] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["provider"][section][key] = toml_edit::value(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_key_on_empty_document() {
        let mut doc = DocumentMut::new();
        set_provider_value(&mut doc, Some(ProviderKind::HuggingFace), "api_key", "hf_abc");

        let config: Config = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.provider.huggingface.api_key, "hf_abc");
        // Untouched sections keep their defaults.
        assert_eq!(config.provider.gemini.api_key, "${GEMINI_API_KEY}");
    }

    #[test]
    fn test_set_key_preserves_comments() {
        let mut doc: DocumentMut = "# my booth\n[provider]\n# pick one\nselected = \"gemini\"\n"
            .parse()
            .unwrap();
        set_provider_value(&mut doc, Some(ProviderKind::Gemini), "api_key", "g-key");

        let text = doc.to_string();
        assert!(text.contains("# my booth"));
        assert!(text.contains("# pick one"));
        let config: Config = toml::from_str(&text).unwrap();
        assert_eq!(config.provider.gemini.api_key, "g-key");
    }

    #[test]
    fn test_set_selected_provider() {
        let mut doc = DocumentMut::new();
        set_provider_value(&mut doc, None, "selected", ProviderKind::HuggingFace.as_str());

        let config: Config = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.provider.selected, ProviderKind::HuggingFace);
    }

    #[test]
    fn test_edit_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        edit_config(&path, |doc| {
            set_provider_value(doc, Some(ProviderKind::HuggingFace), "api_key", "hf_x")
        })
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider.huggingface.api_key, "hf_x");
    }

    #[test]
    fn test_edit_config_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provider\nbroken").unwrap();

        assert!(edit_config(&path, |_| {}).is_err());
    }
}
