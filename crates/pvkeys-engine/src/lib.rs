//! pvkeys_engine - keybinding resolution and typed PV dispatch.
//!
//! - [`extract_value`] - configuration node to [`TypedValue`]
//! - [`parse_key_name`] - `key_*` names to [`KeyCode`]
//! - [`is_compatible`] - value kind vs. [`RemoteType`] policy
//! - [`Binder`] - opens channels and builds the keybinding table
//! - [`execute`] - set/increment dispatch
//! - [`run_event_loop`] - the blocking key loop

pub mod binder;
pub mod client;
pub mod compat;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod keys;
pub mod memory;
pub mod value;

pub use binder::{Binder, Bindings, BoundAction, KeybindingTable, Mode, StartupWrite, StartupWriteList};
pub use client::{Field, PvClient};
pub use compat::{RemoteType, TypeFamily, is_compatible};
pub use dispatch::{execute, execute_startup};
pub use error::{ClientError, EngineError, Result};
pub use event_loop::{InputSource, LoopSummary, run_event_loop};
pub use keys::{KeyCode, parse_key_name};
pub use memory::{MemoryChannel, MemoryClient, WriteRecord};
pub use value::{Number, TypedValue, ValueKind, extract_value};
