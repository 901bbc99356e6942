//! pvkeys-core - configuration loading and PV providers.

pub mod config;
pub mod error;
pub mod provider;
pub mod sim;
pub mod tools;

pub use config::{Config, Overrides, default_config_path};
pub use error::{CoreError, Result};
pub use provider::ProviderKind;
pub use sim::sim_client;
pub use tools::{ToolChannel, ToolClient, ToolKind};
