//! The `booth prompt` command.

use super::open_booth;
use super::theme;
use booth_core::presets::{self, PRESETS};
use booth_core::Config;
use clap::{Args, Subcommand};

/// Arguments for the `prompt` command.
#[derive(Args, Debug)]
pub struct PromptArgs {
    #[command(subcommand)]
    pub command: PromptCommand,
}

#[derive(Subcommand, Debug)]
pub enum PromptCommand {
    /// Show the current prompt
    Show,

    /// Set the prompt used by the next capture
    Set { text: String },

    /// Apply a built-in style, or list them when no name is given
    Preset { name: Option<String> },

    /// List previously used prompts, most recent first
    History,

    /// Make a prompt from the history current again
    Use {
        /// History entry id, as shown by `booth prompt history`
        id: String,
    },
}

/// Execute the prompt command.
pub async fn execute(args: PromptArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        PromptCommand::Preset { name: None } => {
            for preset in PRESETS {
                let description = if preset.is_custom() {
                    "keeps the prompt set with `booth prompt set`"
                } else {
                    preset.prompt
                };
                println!(
                    "{} {:<8} {}",
                    preset.emoji,
                    theme::highlight().apply_to(preset.key),
                    theme::dim().apply_to(description)
                );
            }
            return Ok(());
        }
        PromptCommand::Preset { name: Some(name) } => {
            if presets::find(&name).is_none() {
                anyhow::bail!(
                    "Unknown preset '{name}'. Available: {}",
                    PRESETS.iter().map(|p| p.key).collect::<Vec<_>>().join(", ")
                );
            }
            let booth = open_booth(config, None, None).await?;
            let prompt = booth.apply_preset(&name).await?;
            println!("{prompt}");
        }
        PromptCommand::Show => {
            let booth = open_booth(config, None, None).await?;
            let prompt = booth.snapshot().current_prompt.clone();
            if prompt.is_empty() {
                println!("No prompt set. Use `booth prompt set <text>` or `booth prompt preset <name>`.");
            } else {
                println!("{prompt}");
            }
        }
        PromptCommand::Set { text } => {
            if text.trim().is_empty() {
                anyhow::bail!("Prompt text is empty");
            }
            let booth = open_booth(config, None, None).await?;
            booth.set_prompt(text).await?;
            tracing::info!("Prompt updated");
        }
        PromptCommand::History => {
            let booth = open_booth(config, None, None).await?;
            let history = booth.prompt_history()?;
            if history.is_empty() {
                println!("No prompt history yet.");
            }
            for entry in history {
                println!(
                    "{}  {}\n    {}",
                    theme::dim().apply_to(&entry.id),
                    theme::highlight().apply_to(&entry.title),
                    entry.prompt_text
                );
            }
        }
        PromptCommand::Use { id } => {
            let booth = open_booth(config, None, None).await?;
            let prompt = booth.use_history_entry(id.trim()).await?;
            println!("{prompt}");
        }
    }

    Ok(())
}
