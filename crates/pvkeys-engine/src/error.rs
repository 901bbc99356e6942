//! Error types for the pvkeys engine.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`PvClient`](crate::client::PvClient) implementation.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("PV '{0}' not found")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),

    #[error("unexpected output: {0}")]
    Malformed(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Errors that can occur while binding or dispatching keybindings.
///
/// The first six variants are resolution-time errors and abort startup.
/// [`Write`](EngineError::Write) and
/// [`IncrementOverflow`](EngineError::IncrementOverflow) happen at dispatch
/// time; the event loop logs them and keeps going.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid key name '{0}'")]
    KeyName(String),

    #[error("failed to connect to PV '{pv}': {source}")]
    Connection {
        pv: String,
        #[source]
        source: ClientError,
    },

    #[error("PV '{pv}' is not a supported type: {source}")]
    UnsupportedType {
        pv: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid value for {context}: {found} is not a string, integer, float or boolean")]
    ValueExtraction { context: String, found: &'static str },

    #[error("type mismatch for {context}: PV type '{remote_type}' cannot take a {value_kind} value")]
    TypeMismatch {
        context: String,
        remote_type: String,
        value_kind: &'static str,
    },

    #[error("write to PV '{pv}' failed: {source}")]
    Write {
        pv: String,
        #[source]
        source: ClientError,
    },

    #[error("increment of PV '{pv}' overflowed ({current} + {delta})")]
    IncrementOverflow { pv: String, current: i64, delta: i64 },
}

impl EngineError {
    /// True for errors raised while dispatching a key, as opposed to binding.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            EngineError::Write { .. } | EngineError::IncrementOverflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
