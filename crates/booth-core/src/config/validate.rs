//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_ms must be > 0".into(),
            ));
        }
        if self.generation.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_retries must be > 0".into(),
            ));
        }
        if self.generation.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "generation.base_delay_ms must be > 0".into(),
            ));
        }
        if self.generation.max_delay_ms < self.generation.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "generation.max_delay_ms must be >= generation.base_delay_ms".into(),
            ));
        }
        if self.concurrency.image_slots == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency.image_slots must be > 0".into(),
            ));
        }
        if self.concurrency.text_slots == 0 {
            return Err(ConfigError::ValidationError(
                "concurrency.text_slots must be > 0".into(),
            ));
        }
        if self.provider.gemini.endpoint.is_empty() || self.provider.huggingface.endpoint.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "provider endpoints must not be empty".into(),
            ));
        }
        Ok(())
    }
}
