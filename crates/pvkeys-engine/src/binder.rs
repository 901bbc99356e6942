//! Channel binding.
//!
//! Turns the `keybindings` and `put` configuration sections into channel-bound
//! actions. Binding is all or nothing: the first bad entry aborts with an
//! error and every channel opened so far is dropped with the partial result.

use crate::client::{Field, PvClient};
use crate::compat::{RemoteType, is_compatible};
use crate::error::{EngineError, Result};
use crate::keys::{KeyCode, parse_key_name};
use crate::value::{TypedValue, extract_value, toml_type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use tracing::{debug, warn};

/// How a bound value is applied when its key is pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Write the configured value.
    Set,
    /// Add the configured value to the current one. Numeric values only.
    Increment,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Set => f.write_str("set"),
            Mode::Increment => f.write_str("increment"),
        }
    }
}

/// A key's write, bound to an open channel.
#[derive(Debug)]
pub struct BoundAction<C> {
    pub channel: C,
    /// Full PV name (prefix included).
    pub pv: String,
    /// Type reported when the channel was bound.
    pub remote_type: RemoteType,
    pub value: TypedValue,
    pub mode: Mode,
}

impl<C> BoundAction<C> {
    pub fn field(&self) -> Field {
        self.remote_type.target_field()
    }
}

impl<C> fmt::Display for BoundAction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Mode::Set => write!(f, "{} = {}", self.pv, self.value),
            Mode::Increment => write!(f, "{} += {}", self.pv, self.value),
        }
    }
}

/// One write executed before the event loop starts.
#[derive(Debug)]
pub struct StartupWrite<C> {
    pub channel: C,
    pub pv: String,
    pub remote_type: RemoteType,
    pub value: TypedValue,
}

impl<C> StartupWrite<C> {
    pub fn field(&self) -> Field {
        self.remote_type.target_field()
    }
}

pub type KeybindingTable<C> = HashMap<KeyCode, BoundAction<C>>;
pub type StartupWriteList<C> = Vec<StartupWrite<C>>;

/// Everything produced by a successful bind.
#[derive(Debug)]
pub struct Bindings<C> {
    pub keys: KeybindingTable<C>,
    pub startup: StartupWriteList<C>,
}

/// A channel that has been opened and type-checked against its value.
struct CheckedChannel<C> {
    channel: C,
    pv: String,
    remote_type: RemoteType,
    value: TypedValue,
}

/// Binds configuration entries to channels of a [`PvClient`].
pub struct Binder<'a, P: PvClient> {
    client: &'a P,
    prefix: &'a str,
    quit: Option<KeyCode>,
}

impl<'a, P: PvClient> Binder<'a, P> {
    pub fn new(client: &'a P, prefix: &'a str) -> Self {
        Binder {
            client,
            prefix,
            quit: None,
        }
    }

    /// Reject any binding for `quit`, which the event loop never dispatches.
    pub fn with_quit_key(mut self, quit: KeyCode) -> Self {
        self.quit = Some(quit);
        self
    }

    /// Bind both configuration sections. Either may be absent.
    pub fn bind(
        &self,
        keybindings: Option<&toml::Value>,
        put: Option<&toml::Value>,
    ) -> Result<Bindings<P::Channel>> {
        let startup = self.bind_startup_writes(put)?;
        let keys = self.bind_keys(keybindings)?;
        Ok(Bindings { keys, startup })
    }

    /// Bind the `keybindings` table (`key_* -> {pv, value, increment}`).
    pub fn bind_keys(&self, section: Option<&toml::Value>) -> Result<KeybindingTable<P::Channel>> {
        let mut table = KeybindingTable::new();
        let Some(section) = section else {
            return Ok(table);
        };
        let toml::Value::Table(entries) = section else {
            return Err(EngineError::Config(format!(
                "'keybindings' must be a table, found {}",
                toml_type_name(section)
            )));
        };

        for (key_name, entry) in entries {
            let context = format!("key '{}'", key_name);
            let entry = entry_table(entry, &context)?;
            let pv = pv_name(entry, &context)?;
            let key = parse_key_name(key_name)?;

            if self.quit == Some(key) {
                return Err(EngineError::Config(format!(
                    "{} is bound to the quit key",
                    context
                )));
            }

            let checked = self.open_checked(pv, entry, &context)?;
            let mode = self.mode_for(entry, &checked.value, &context)?;

            debug!(key = %key, pv = %checked.pv, remote_type = %checked.remote_type, %mode, "bound key");
            let action = BoundAction {
                channel: checked.channel,
                pv: checked.pv,
                remote_type: checked.remote_type,
                value: checked.value,
                mode,
            };
            match table.entry(key) {
                Entry::Occupied(_) => {
                    return Err(EngineError::Config(format!(
                        "{} binds key {} more than once",
                        context, key
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(action);
                }
            }
        }

        Ok(table)
    }

    /// Bind the `put` array (`[{pv, value}, ...]`), keeping its order.
    pub fn bind_startup_writes(
        &self,
        section: Option<&toml::Value>,
    ) -> Result<StartupWriteList<P::Channel>> {
        let mut writes = StartupWriteList::new();
        let Some(section) = section else {
            return Ok(writes);
        };
        let toml::Value::Array(entries) = section else {
            return Err(EngineError::Config(format!(
                "'put' must be an array of {{ pv, value }} tables, found {}",
                toml_type_name(section)
            )));
        };

        for (idx, entry) in entries.iter().enumerate() {
            let context = format!("put #{}", idx + 1);
            let entry = entry_table(entry, &context)?;
            let pv = pv_name(entry, &context)?;
            if entry.contains_key("increment") {
                debug!(%context, "'increment' is ignored for startup writes");
            }
            let checked = self.open_checked(pv, entry, &context)?;
            writes.push(StartupWrite {
                channel: checked.channel,
                pv: checked.pv,
                remote_type: checked.remote_type,
                value: checked.value,
            });
        }

        Ok(writes)
    }

    /// Connect, classify the remote type, extract the value and check that
    /// the two agree. The channel is dropped if any later step fails.
    fn open_checked(
        &self,
        short_name: &str,
        entry: &toml::Table,
        context: &str,
    ) -> Result<CheckedChannel<P::Channel>> {
        let pv = format!("{}{}", self.prefix, short_name);
        let channel = self
            .client
            .connect(&pv)
            .map_err(|source| EngineError::Connection {
                pv: pv.clone(),
                source,
            })?;

        let remote_type =
            self.client
                .remote_type(&channel)
                .map_err(|source| EngineError::UnsupportedType {
                    pv: pv.clone(),
                    source,
                })?;

        let node = entry
            .get("value")
            .ok_or_else(|| EngineError::Config(format!("missing 'value' in {}", context)))?;
        let value = extract_value(node, context)?;

        if !is_compatible(&remote_type, value.kind()) {
            return Err(EngineError::TypeMismatch {
                context: context.to_string(),
                remote_type: remote_type.name().to_string(),
                value_kind: value.kind().name(),
            });
        }

        Ok(CheckedChannel {
            channel,
            pv,
            remote_type,
            value,
        })
    }

    fn mode_for(&self, entry: &toml::Table, value: &TypedValue, context: &str) -> Result<Mode> {
        let increment = match entry.get("increment") {
            None => false,
            Some(toml::Value::Boolean(flag)) => *flag,
            Some(other) => {
                return Err(EngineError::Config(format!(
                    "'increment' in {} must be a boolean, found {}",
                    context,
                    toml_type_name(other)
                )));
            }
        };

        if !increment {
            return Ok(Mode::Set);
        }
        if value.kind().is_numeric() {
            Ok(Mode::Increment)
        } else {
            warn!(
                %context,
                kind = value.kind().name(),
                "increment only applies to numeric values; binding as set"
            );
            Ok(Mode::Set)
        }
    }
}

fn entry_table<'v>(entry: &'v toml::Value, context: &str) -> Result<&'v toml::Table> {
    entry.as_table().ok_or_else(|| {
        EngineError::Config(format!(
            "{} must be a table with 'pv' and 'value', found {}",
            context,
            toml_type_name(entry)
        ))
    })
}

fn pv_name<'v>(entry: &'v toml::Table, context: &str) -> Result<&'v str> {
    match entry.get("pv") {
        Some(toml::Value::String(name)) if !name.is_empty() => Ok(name.as_str()),
        Some(toml::Value::String(_)) => Err(EngineError::Config(format!(
            "empty PV name in {}",
            context
        ))),
        Some(other) => Err(EngineError::Config(format!(
            "invalid PV name in {}: expected a string, found {}",
            context,
            toml_type_name(other)
        ))),
        None => Err(EngineError::Config(format!("missing PV name in {}", context))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;

    fn config(src: &str) -> toml::Table {
        toml::from_str(src).expect("valid toml")
    }

    fn motor_client() -> MemoryClient {
        MemoryClient::new()
            .with_pv("IOC:m1.TWF", "double", TypedValue::Float(0.0))
            .with_pv("IOC:m1.VAL", "double", TypedValue::Float(5.0))
            .with_pv("IOC:mode", "enum_t", TypedValue::Integer(0))
            .with_pv("IOC:count", "int", TypedValue::Integer(0))
            .with_pv("IOC:enabled", "boolean", TypedValue::Boolean(false))
            .with_pv("IOC:label", "string", TypedValue::Text(String::new()))
    }

    #[test]
    fn binds_keys_with_prefix() {
        let client = motor_client();
        let cfg = config(
            r#"
[keybindings.key_right]
pv = "m1.TWF"
value = 1

[keybindings.key_up]
pv = "m1.VAL"
value = 0.5
increment = true
"#,
        );
        let table = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap();

        assert_eq!(table.len(), 2);
        let right = &table[&KeyCode::Right];
        assert_eq!(right.pv, "IOC:m1.TWF");
        assert_eq!(right.mode, Mode::Set);
        assert_eq!(right.value, TypedValue::Integer(1));
        let up = &table[&KeyCode::Up];
        assert_eq!(up.mode, Mode::Increment);
        assert_eq!(client.open_channels(), 2);
    }

    #[test]
    fn missing_sections_bind_nothing() {
        let client = motor_client();
        let bindings = Binder::new(&client, "IOC:").bind(None, None).unwrap();
        assert!(bindings.keys.is_empty());
        assert!(bindings.startup.is_empty());
    }

    #[test]
    fn missing_pv_is_config_error() {
        let client = motor_client();
        let cfg = config("[keybindings.key_a]\nvalue = 1\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("missing PV name")));
    }

    #[test]
    fn non_string_pv_is_config_error() {
        let client = motor_client();
        let cfg = config("[keybindings.key_a]\npv = 3\nvalue = 1\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn bad_key_name_fails_before_connecting() {
        let client = motor_client();
        let cfg = config("[keybindings.key_pgup]\npv = \"count\"\nvalue = 1\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::KeyName(ref n) if n == "key_pgup"));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn unreachable_pv_names_full_name() {
        let client = motor_client();
        let cfg = config("[keybindings.key_a]\npv = \"ghost\"\nvalue = 1\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        match err {
            EngineError::Connection { pv, .. } => assert_eq!(pv, "IOC:ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_type_releases_channel() {
        let client = motor_client();
        client.add_unsupported_pv("IOC:waveform");
        let cfg = config("[keybindings.key_w]\npv = \"waveform\"\nvalue = 1\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedType { .. }));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn bad_value_shape_releases_channel() {
        let client = motor_client();
        let cfg = config("[keybindings.key_a]\npv = \"count\"\nvalue = [1, 2]\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::ValueExtraction { found: "array", .. }));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn missing_value_is_config_error() {
        let client = motor_client();
        let cfg = config("[keybindings.key_a]\npv = \"count\"\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("missing 'value'")));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn mismatch_names_key_and_types() {
        let client = motor_client();
        let cfg = config("[keybindings.key_e]\npv = \"enabled\"\nvalue = \"yes\"\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("key_e"), "{message}");
        assert!(message.contains("boolean"), "{message}");
        assert!(message.contains("string"), "{message}");
    }

    #[test]
    fn failure_drops_channels_of_earlier_entries() {
        let client = motor_client();
        let cfg = config(
            r#"
[keybindings.key_a]
pv = "count"
value = 1

[keybindings.key_b]
pv = "count"
value = 1.5
"#,
        );
        let result = Binder::new(&client, "IOC:").bind_keys(cfg.get("keybindings"));
        assert!(matches!(result, Err(EngineError::TypeMismatch { .. })));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn increment_ignored_for_text_and_boolean() {
        let client = motor_client();
        let cfg = config(
            r#"
[keybindings.key_l]
pv = "label"
value = "hello"
increment = true

[keybindings.key_e]
pv = "enabled"
value = true
increment = true
"#,
        );
        let table = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap();
        assert_eq!(table[&KeyCode::Char('l')].mode, Mode::Set);
        assert_eq!(table[&KeyCode::Char('e')].mode, Mode::Set);
    }

    #[test]
    fn increment_false_is_set() {
        let client = motor_client();
        let cfg = config("[keybindings.key_c]\npv = \"count\"\nvalue = 1\nincrement = false\n");
        let table = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap();
        assert_eq!(table[&KeyCode::Char('c')].mode, Mode::Set);
    }

    #[test]
    fn non_boolean_increment_is_config_error() {
        let client = motor_client();
        let cfg = config("[keybindings.key_c]\npv = \"count\"\nvalue = 1\nincrement = \"yes\"\n");
        let err = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("increment")));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn quit_key_cannot_be_bound() {
        let client = motor_client();
        let cfg = config("[keybindings.key_q]\npv = \"count\"\nvalue = 1\n");
        let err = Binder::new(&client, "IOC:")
            .with_quit_key(KeyCode::Char('q'))
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("quit")));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn keybindings_must_be_a_table() {
        let client = motor_client();
        let cfg = config("keybindings = [1]\n");
        let err = Binder::new(&client, "")
            .bind_keys(cfg.get("keybindings"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn startup_writes_keep_config_order() {
        let client = motor_client();
        let cfg = config(
            r#"
[[put]]
pv = "count"
value = 3

[[put]]
pv = "m1.VAL"
value = 2

[[put]]
pv = "count"
value = 4
"#,
        );
        let writes = Binder::new(&client, "IOC:")
            .bind_startup_writes(cfg.get("put"))
            .unwrap();
        let order: Vec<(&str, &TypedValue)> =
            writes.iter().map(|w| (w.pv.as_str(), &w.value)).collect();
        assert_eq!(
            order,
            vec![
                ("IOC:count", &TypedValue::Integer(3)),
                ("IOC:m1.VAL", &TypedValue::Integer(2)),
                ("IOC:count", &TypedValue::Integer(4)),
            ]
        );
    }

    #[test]
    fn startup_writes_reject_table_form() {
        let client = motor_client();
        let cfg = config("[put]\ncount = 3\n");
        let err = Binder::new(&client, "IOC:")
            .bind_startup_writes(cfg.get("put"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("array")));
    }

    #[test]
    fn startup_write_mismatch_fails_whole_bind() {
        let client = motor_client();
        let cfg = config(
            r#"
[[put]]
pv = "count"
value = 3

[[put]]
pv = "label"
value = 1

[keybindings.key_a]
pv = "count"
value = 1
"#,
        );
        let result = Binder::new(&client, "IOC:").bind(cfg.get("keybindings"), cfg.get("put"));
        assert!(matches!(result, Err(EngineError::TypeMismatch { .. })));
        assert_eq!(client.open_channels(), 0);
    }

    #[test]
    fn action_display() {
        let client = motor_client();
        let cfg = config("[keybindings.key_up]\npv = \"m1.VAL\"\nvalue = 0.5\nincrement = true\n");
        let table = Binder::new(&client, "IOC:")
            .bind_keys(cfg.get("keybindings"))
            .unwrap();
        assert_eq!(table[&KeyCode::Up].to_string(), "IOC:m1.VAL += 0.5");
    }
}
