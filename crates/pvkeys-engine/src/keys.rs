//! Key names and key codes.
//!
//! Keybindings are written as `key_<name>` in the configuration, e.g.
//! `key_right`, `key_space` or `key_a`.

use crate::error::{EngineError, Result};
use std::fmt;

const KEY_PREFIX: &str = "key_";

/// A key the operator can press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Space,
    Char(char),
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Up => f.write_str("Up"),
            KeyCode::Down => f.write_str("Down"),
            KeyCode::Left => f.write_str("Left"),
            KeyCode::Right => f.write_str("Right"),
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Space => f.write_str("Space"),
            KeyCode::Char(c) => write!(f, "{}", c),
        }
    }
}

/// Resolve a `key_*` name from the configuration into a [`KeyCode`].
pub fn parse_key_name(name: &str) -> Result<KeyCode> {
    let Some(rest) = name.strip_prefix(KEY_PREFIX) else {
        return Err(EngineError::KeyName(name.to_string()));
    };

    match rest {
        "up" => return Ok(KeyCode::Up),
        "down" => return Ok(KeyCode::Down),
        "left" => return Ok(KeyCode::Left),
        "right" => return Ok(KeyCode::Right),
        "enter" => return Ok(KeyCode::Enter),
        "space" => return Ok(KeyCode::Space),
        _ => {}
    }

    match single_char(rest) {
        Some(ch) if ch.is_ascii_alphanumeric() => Ok(KeyCode::Char(ch)),
        _ => Err(EngineError::KeyName(name.to_string())),
    }
}

fn single_char(input: &str) -> Option<char> {
    let mut chars = input.chars();
    let ch = chars.next()?;
    if chars.next().is_none() {
        Some(ch)
    } else {
        None
    }
}
