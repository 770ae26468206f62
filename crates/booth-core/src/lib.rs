//! Booth Core - prompt-driven image generation with a durable photo lifecycle.
//!
//! Booth takes a captured image and a text prompt, asks a remote generative
//! model for a transformed image, and keeps every photo's input and output in
//! a local durable store that survives restarts.
//!
//! # Architecture
//!
//! ```text
//! capture → Store(input) → Dispatcher[text]  → Executor → TextProvider  (title)
//!                        → Dispatcher[image] → Executor → ImageProvider → Store(output) → Ready
//! startup → Store → reconcile → published state
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use booth_core::{Booth, Config, ImageBlob};
//!
//! #[tokio::main]
//! async fn main() -> booth_core::Result<()> {
//!     let booth = Booth::open(Config::load()?).await?;
//!     booth.set_prompt("Make this photo look like a 1970s film photo").await?;
//!
//!     let bytes = std::fs::read("selfie.jpg").expect("read image");
//!     let outcome = booth.capture(ImageBlob::sniff(bytes)).await?;
//!     println!("Photo {} ready", outcome.id());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod presets;
pub mod provider;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{BoothError, ConfigError, GenerateError, Result, StoreError};
pub use executor::{CallFailure, Executor, RetryPolicy};
pub use lifecycle::{Booth, BoothBuilder, CaptureOutcome, RegenerateOutcome, ResolvedPhoto};
pub use provider::{ImageProvider, ProviderFactory, TextProvider};
pub use state::BoothState;
pub use types::{
    DurableImageEntry, ImageBlob, OperationClass, PhotoId, PhotoRecord, PhotoStatus,
    PromptHistoryEntry, ProviderKind,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_open_with_defaults_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.data_dir = dir.path().to_path_buf();

        let booth = Booth::open(config).await.unwrap();
        let state = booth.snapshot();
        assert!(state.rehydrated);
        assert!(state.photos.is_empty());
        assert!(dir.path().join("images").is_dir());
    }
}
