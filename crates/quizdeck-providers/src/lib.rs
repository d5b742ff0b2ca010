//! quizdeck-providers: Explanation providers and configuration.
//!
//! Implements the `ExplanationProvider` trait for OpenAI-compatible chat
//! APIs and a mock, and loads the `quizdeck.toml` configuration file.

pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{
    create_explainer, load_config, load_config_from, CacheSettings, ExplainerConfig,
    QuizdeckConfig,
};
pub use error::ProviderError;
