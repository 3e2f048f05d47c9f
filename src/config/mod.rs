// Configuration management module
// TOML configuration, validation, and artifact path layout

pub mod settings;

pub use settings::{Config, ConfigError, OllamaConfig, RetrievalConfig};
