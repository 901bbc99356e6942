//! Error types for pvkeys core.

use pvkeys_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while loading configuration or building a provider.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
