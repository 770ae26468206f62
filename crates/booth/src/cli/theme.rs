//! Terminal styling shared by prompts and listings.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// Dialoguer theme: cyan `?` prompt, green `✓` on success.
pub fn booth_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().cyan(),
        prompt_style: Style::new().for_stderr().bold(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        ..ColorfulTheme::default()
    }
}

pub fn dim() -> Style {
    Style::new().dim()
}

pub fn highlight() -> Style {
    Style::new().cyan()
}

pub fn success() -> Style {
    Style::new().green()
}
