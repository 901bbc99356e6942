//! Configuration file loading.
//!
//! ```toml
//! provider = "ca"
//! prefix = "IOC:"
//! quit = "q"
//!
//! [[put]]
//! pv = "m1.VELO"
//! value = 2.0
//!
//! [keybindings.key_right]
//! pv = "m1.TWF"
//! value = 1
//! ```
//!
//! The `keybindings` and `put` sections are kept as raw TOML and handed to
//! the engine's binder, which does its own validation.

use crate::error::{CoreError, Result};
use crate::provider::ProviderKind;
use directories::ProjectDirs;
use pvkeys_engine::KeyCode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB
const DEFAULT_QUIT_KEY: char = 'q';
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    provider: Option<String>,
    prefix: Option<String>,
    quit: Option<String>,
    timeout_ms: Option<u64>,
    keybindings: Option<toml::Value>,
    put: Option<toml::Value>,
    sim: Option<toml::Table>,
}

/// Resolved configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider: ProviderKind,
    /// Prepended to every PV name.
    pub prefix: String,
    pub quit: KeyCode,
    /// Per-command timeout for the command-line tool providers.
    pub timeout: Duration,
    pub keybindings: Option<toml::Value>,
    pub put: Option<toml::Value>,
    /// PV declarations for the `sim` provider, keyed by full PV name.
    pub sim: toml::Table,
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub prefix: Option<String>,
    pub provider: Option<ProviderKind>,
}

impl Config {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Config> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > MAX_CONFIG_FILE_BYTES {
            return Err(CoreError::Config(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Config::parse(&content, &path.display().to_string())
    }

    /// Parse configuration from a string. `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Config> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| CoreError::Toml {
            path: origin.to_string(),
            source,
        })?;

        let provider = match file.provider.as_deref() {
            Some(name) => name.parse::<ProviderKind>().map_err(CoreError::Config)?,
            None => ProviderKind::default(),
        };
        let quit = match file.quit.as_deref() {
            Some(raw) => parse_quit_key(raw)?,
            None => KeyCode::Char(DEFAULT_QUIT_KEY),
        };
        let timeout_ms = file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(CoreError::Config("'timeout_ms' must be positive".to_string()));
        }

        Ok(Config {
            provider,
            prefix: file.prefix.unwrap_or_default(),
            quit,
            timeout: Duration::from_millis(timeout_ms),
            keybindings: file.keybindings,
            put: file.put,
            sim: file.sim.unwrap_or_default(),
        })
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(prefix) = &overrides.prefix {
            self.prefix = prefix.clone();
        }
        if let Some(provider) = overrides.provider {
            self.provider = provider;
        }
    }
}

/// `<config dir>/pvkeys/pvkeys.toml`, used when no path is given.
pub fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "pvkeys")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("pvkeys.toml");
    Some(path)
}

fn parse_quit_key(raw: &str) -> Result<KeyCode> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(' '), None) => Ok(KeyCode::Space),
        (Some('\n' | '\r'), None) => Ok(KeyCode::Enter),
        (Some(ch), None) => Ok(KeyCode::Char(ch)),
        _ => Err(CoreError::Config(format!(
            "'quit' must be a single character, got {:?}",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_for_minimal_file() {
        let config = Config::parse("", "test").unwrap();
        assert_eq!(config.provider, ProviderKind::Ca);
        assert_eq!(config.prefix, "");
        assert_eq!(config.quit, KeyCode::Char('q'));
        assert_eq!(config.timeout, Duration::from_millis(5_000));
        assert!(config.keybindings.is_none());
        assert!(config.put.is_none());
        assert!(config.sim.is_empty());
    }

    #[test]
    fn reads_all_fields() {
        let config = Config::parse(
            r#"
provider = "pva"
prefix = "IOC:"
quit = "x"
timeout_ms = 250

[[put]]
pv = "m1.VELO"
value = 2.0

[keybindings.key_right]
pv = "m1.TWF"
value = 1

[sim."IOC:m1.TWF"]
type = "double"
"#,
            "test",
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Pva);
        assert_eq!(config.prefix, "IOC:");
        assert_eq!(config.quit, KeyCode::Char('x'));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(config.keybindings.as_ref().is_some_and(|k| k.is_table()));
        assert!(config.put.as_ref().is_some_and(|p| p.is_array()));
        assert!(config.sim.contains_key("IOC:m1.TWF"));
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let err = Config::parse("prefx = \"IOC:\"\n", "pvkeys.toml").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Failed to parse pvkeys.toml"), "{message}");
    }

    #[test]
    fn rejects_bad_quit_key() {
        let err = Config::parse("quit = \"qq\"\n", "test").unwrap_err();
        assert!(err.to_string().contains("single character"));
        let err = Config::parse("quit = \"\"\n", "test").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn space_quit_key() {
        let config = Config::parse("quit = \" \"\n", "test").unwrap();
        assert_eq!(config.quit, KeyCode::Space);
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = Config::parse("provider = \"tcp\"\n", "test").unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(Config::parse("timeout_ms = 0\n", "test").is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::parse("prefix = \"A:\"\nprovider = \"ca\"\n", "test").unwrap();
        config.apply(&Overrides {
            prefix: Some("B:".to_string()),
            provider: Some(ProviderKind::Sim),
        });
        assert_eq!(config.prefix, "B:");
        assert_eq!(config.provider, ProviderKind::Sim);

        config.apply(&Overrides::default());
        assert_eq!(config.prefix, "B:");
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "prefix = \"IOC:\"").expect("write config");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.prefix, "IOC:");
    }

    #[test]
    fn load_rejects_oversized_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let oversized = "#".repeat(MAX_CONFIG_FILE_BYTES as usize + 1);
        file.write_all(oversized.as_bytes()).expect("write config");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("file too large"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
