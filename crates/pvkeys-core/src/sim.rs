//! The `sim` provider: in-memory PVs declared in the config.
//!
//! ```toml
//! [sim."IOC:m1.TWF"]
//! type = "double"
//! value = 0.0
//!
//! [sim."IOC:m1.SPMG"]
//! type = "enum_t"
//! ```
//!
//! Names are full PV names, prefix included. `value` is optional and
//! defaults to zero, `false` or the empty string depending on the type.

use crate::error::{CoreError, Result};
use crate::provider::is_scalar_type_id;
use pvkeys_engine::{
    MemoryClient, RemoteType, TypeFamily, TypedValue, extract_value, is_compatible,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimPv {
    #[serde(rename = "type")]
    remote_type: String,
    value: Option<toml::Value>,
}

/// Build a [`MemoryClient`] holding the PVs declared in `section`.
pub fn sim_client(section: &toml::Table) -> Result<MemoryClient> {
    let client = MemoryClient::new();
    for (name, entry) in section {
        let pv: SimPv = entry.clone().try_into().map_err(|err| {
            CoreError::Config(format!("invalid sim PV '{}': {}", name, err))
        })?;

        if !is_scalar_type_id(&pv.remote_type) {
            client.add_unsupported_pv(name);
            continue;
        }

        let remote_type = RemoteType::new(pv.remote_type.as_str());
        let value = match &pv.value {
            Some(node) => extract_value(node, &format!("sim PV '{}'", name))?,
            None => initial_value(&remote_type),
        };
        if !is_compatible(&remote_type, value.kind()) {
            return Err(CoreError::Config(format!(
                "sim PV '{}': type '{}' cannot hold a {} value",
                name,
                remote_type,
                value.kind()
            )));
        }
        client.add_pv(name, remote_type.name(), value);
    }
    Ok(client)
}

fn initial_value(remote_type: &RemoteType) -> TypedValue {
    match remote_type.family() {
        TypeFamily::Float => TypedValue::Float(0.0),
        TypeFamily::Boolean => TypedValue::Boolean(false),
        TypeFamily::Text => TypedValue::Text(String::new()),
        TypeFamily::Integer => TypedValue::Integer(0),
    }
}
